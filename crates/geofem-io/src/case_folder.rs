//! Case folders (inputs) and result folders (outputs) as JSON files.
//!
//! ```text
//! case/                     results/
//!   request.json              result.json          result_meta
//!   mesh.json                 result_fields.json   {key: {shape, data}}
//! ```

use crate::error::{IoError, Result};
use crate::mesh_json::{mesh_from_json, mesh_to_json};
use geofem_solver::{FieldArchive, Mesh, ResultMeta, SolveOutput, SolveRequest};
use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

pub const REQUEST_FILE: &str = "request.json";
pub const MESH_FILE: &str = "mesh.json";
pub const RESULT_FILE: &str = "result.json";
pub const FIELDS_FILE: &str = "result_fields.json";

/// Inputs of one run.
#[derive(Debug, Clone)]
pub struct CaseFolder {
    pub request: SolveRequest,
    pub mesh: Mesh,
}

/// Paths written by [`write_result_folder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultFiles {
    pub meta_path: PathBuf,
    pub fields_path: PathBuf,
}

pub fn read_case_folder(dir: impl AsRef<Path>) -> Result<CaseFolder> {
    let dir = dir.as_ref();
    let request: SolveRequest = read_json(&dir.join(REQUEST_FILE))?;
    let mesh_doc: serde_json::Value = read_json(&dir.join(MESH_FILE))?;
    let mesh = mesh_from_json(&mesh_doc)?;
    debug!(
        "read case {}: {} node(s), {} cell(s), {} stage(s)",
        dir.display(),
        mesh.num_nodes(),
        mesh.total_cells(),
        request.stages.len()
    );
    Ok(CaseFolder { request, mesh })
}

pub fn write_case_folder(dir: impl AsRef<Path>, request: &SolveRequest, mesh: &Mesh) -> Result<()> {
    let dir = dir.as_ref();
    write_json(&dir.join(REQUEST_FILE), request)?;
    write_json(&dir.join(MESH_FILE), &mesh_to_json(mesh))
}

pub fn write_result_folder(dir: impl AsRef<Path>, output: &SolveOutput) -> Result<ResultFiles> {
    let dir = dir.as_ref();
    let files = ResultFiles {
        meta_path: dir.join(RESULT_FILE),
        fields_path: dir.join(FIELDS_FILE),
    };
    write_json(&files.meta_path, &output.meta)?;
    write_json(&files.fields_path, &output.archive)?;
    debug!(
        "wrote {} array(s) to {}",
        output.archive.len(),
        files.fields_path.display()
    );
    Ok(files)
}

pub fn read_result_folder(dir: impl AsRef<Path>) -> Result<(ResultMeta, FieldArchive)> {
    let dir = dir.as_ref();
    let meta = read_json(&dir.join(RESULT_FILE))?;
    let archive = read_json(&dir.join(FIELDS_FILE))?;
    Ok((meta, archive))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(path, bytes)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(IoError::FileNotFound(path.display().to_string()));
    }
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}
