use log::debug;
use underwriting_core::ProtocolDefaults;

use super::file;

/// Protocol defaults from `--config`, or the built-in defaults. YAML is
/// chosen by a `.yaml`/`.yml` extension, JSON otherwise. Fields the file
/// omits keep their defaults.
pub fn load_defaults(path: Option<&str>) -> Result<ProtocolDefaults, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(ProtocolDefaults::default());
    };

    let lower = path.to_ascii_lowercase();
    let defaults: ProtocolDefaults = if lower.ends_with(".yaml") || lower.ends_with(".yml") {
        file::read_yaml(path)?
    } else {
        file::read_json(path)?
    };
    defaults.validate()?;
    debug!("loaded protocol defaults from {}", path);
    Ok(defaults)
}
