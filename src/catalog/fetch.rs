use serde_json::Value;

use super::Descriptor;
use crate::error::{Result, SchemaError};
use crate::platform::RepositoryHandle;

/// Fetches `path` from `repo` and parses it as a relaxed-JSON descriptor.
///
/// A missing file surfaces as `Error::FileNotFound`; bytes that are not UTF-8
/// or not JSON5 surface as `SchemaError::Malformed`.
pub fn fetch(repo: &dyn RepositoryHandle, path: &str) -> Result<Descriptor> {
    let bytes = repo.get_contents(path)?;
    let contents = parse_contents(path, &bytes)?;
    tracing::debug!("Fetched {path} from {}", repo.full_name());
    Ok(Descriptor {
        path: path.to_string(),
        contents,
    })
}

/// Parses descriptor bytes as JSON5, which accepts comments and trailing commas.
pub fn parse_contents(path: &str, bytes: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(bytes).map_err(|e| SchemaError::Malformed {
        path: path.to_string(),
        message: format!("not valid UTF-8: {e}"),
    })?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    json5::from_str::<Value>(text).map_err(|e| {
        SchemaError::Malformed {
            path: path.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::platform::{MemoryPlatform, Platform};

    #[test]
    fn test_parse_relaxed_json() {
        let text = r#"
        /* generated */
        {
            // the service name
            "name": "billing",
            "priority": 2,
            "dependencies": ["auth",],
        }
        "#;
        let value = parse_contents("catalog.json", text.as_bytes()).unwrap();
        assert_eq!(value["name"], "billing");
        assert_eq!(value["priority"].as_i64(), Some(2));
        assert_eq!(value["dependencies"][0], "auth");
    }

    #[test]
    fn test_parse_strips_bom() {
        let bytes = "\u{feff}{\"name\": \"billing\"}".as_bytes();
        let value = parse_contents("catalog.json", bytes).unwrap();
        assert_eq!(value["name"], "billing");
    }

    #[test]
    fn test_parse_malformed() {
        let err = parse_contents("catalog.json", b"{name: ").unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(SchemaError::Malformed { ref path, .. }) if path == "catalog.json"
        ));

        let err = parse_contents("catalog.json", &[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, Error::Schema(SchemaError::Malformed { .. })));
    }

    #[test]
    fn test_fetch_distinguishes_missing_from_malformed() {
        let platform = MemoryPlatform::new();
        platform.add_repository("acme", "billing");
        platform.put_file("acme/billing", "catalog.json", "{ not json");
        let repo = platform.repository("acme", "billing").unwrap();

        assert!(matches!(
            fetch(repo.as_ref(), "catalog.json"),
            Err(Error::Schema(SchemaError::Malformed { .. }))
        ));
        assert!(matches!(
            fetch(repo.as_ref(), "service.json"),
            Err(Error::FileNotFound { .. })
        ));
    }
}
