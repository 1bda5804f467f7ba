//! Target architecture resolution.

use bootkit_schema::{BuildArchitectures, BuildRecord, OsArch};

use super::error::{BootstrapError, IntegrityError, join};

/// The `os.*` architectures the tool was built for, in discovery order and
/// without duplicates, narrowed to `requested` when given.
///
/// Every build must carry exactly one `os.*` component; anything else means
/// the catalog is malformed and the whole run stops.
pub fn resolve_target_arches(
    tool_builds: &[BuildRecord],
    requested: Option<&OsArch>,
) -> Result<Vec<OsArch>, BootstrapError> {
    let mut arches: Vec<OsArch> = Vec::new();
    for build in tool_builds {
        let arch = BuildArchitectures::parse(&build.build_architectures)
            .and_then(|parsed| parsed.os_arch())
            .map_err(IntegrityError::from)?;
        if !arches.contains(&arch) {
            arches.push(arch);
        }
    }

    if let Some(requested) = requested {
        if !arches.contains(requested) {
            return Err(BootstrapError::UnsupportedArchitecture {
                requested: requested.clone(),
                available: join(&arches),
            });
        }
        return Ok(vec![requested.clone()]);
    }

    Ok(arches)
}
