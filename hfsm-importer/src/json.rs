use crate::dto::MachineDto;
use crate::error::ImportError;

/// Parse a JSON description into a [`MachineDto`]. Validation beyond
/// structural decoding happens later, in `dto_to_builder`.
pub fn parse_json(json: &str) -> Result<MachineDto, ImportError> {
    let dto: MachineDto = serde_json::from_str(json)?;
    Ok(dto)
}
