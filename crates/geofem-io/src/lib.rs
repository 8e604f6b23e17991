//! File boundary of the geofem solver.
//!
//! - **Mesh documents**: flat-key JSON (`points`, `cells_<type>`,
//!   `node_set__*`, `edge_set__*`, `elem_set__*__<type>`)
//! - **Case folders**: `request.json` + `mesh.json`
//! - **Result folders**: `result.json` (result meta) + `result_fields.json`
//!   (field archive)

pub mod case_folder;
pub mod error;
pub mod mesh_json;

pub use case_folder::{
    CaseFolder, FIELDS_FILE, MESH_FILE, REQUEST_FILE, RESULT_FILE, ResultFiles, read_case_folder,
    read_result_folder, write_case_folder, write_result_folder,
};
pub use error::{IoError, Result};
pub use mesh_json::{mesh_from_json, mesh_to_json};
