//! Registry input file loading and firm selection.

use std::path::Path;

use tracing::{debug, info};

use vcdossier_shared::{DossierError, FirmRecord, Result};

/// Load the JSON array of registry records at `path`.
///
/// Records without a name are dropped.
pub async fn load_firm_records(path: &Path) -> Result<Vec<FirmRecord>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| DossierError::io(path, e))?;
    let records: Vec<FirmRecord> = serde_json::from_str(&raw).map_err(|e| {
        DossierError::validation(format!(
            "input file {} is not a JSON array of firm records: {e}",
            path.display()
        ))
    })?;

    let total = records.len();
    let records: Vec<FirmRecord> = records
        .into_iter()
        .filter(|r| !r.name.trim().is_empty())
        .collect();
    if records.len() < total {
        debug!(dropped = total - records.len(), "records without a name skipped");
    }
    info!(path = %path.display(), firms = records.len(), "input records loaded");
    Ok(records)
}

/// Find a record by exact name, falling back to a case-insensitive match.
pub fn find_record<'a>(records: &'a [FirmRecord], name: &str) -> Option<&'a FirmRecord> {
    let name = name.trim();
    records
        .iter()
        .find(|r| r.name == name)
        .or_else(|| records.iter().find(|r| r.name.trim().eq_ignore_ascii_case(name)))
}

/// Pick the records to process: the named firms (in the order given) or
/// every record, then cap at `limit`.
///
/// Fails when a requested name is not in `records`.
pub fn select_records(
    records: &[FirmRecord],
    names: &[String],
    limit: Option<usize>,
) -> Result<Vec<FirmRecord>> {
    let mut selected: Vec<FirmRecord> = if names.is_empty() {
        records.to_vec()
    } else {
        names
            .iter()
            .map(|name| {
                find_record(records, name)
                    .cloned()
                    .ok_or_else(|| DossierError::validation(format!("firm \"{name}\" not found in input file")))
            })
            .collect::<Result<_>>()?
    };

    if let Some(limit) = limit {
        selected.truncate(limit);
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn records() -> Vec<FirmRecord> {
        vec![
            FirmRecord::named("Acme Ventures"),
            FirmRecord::named("Blue Peak Capital"),
            FirmRecord::named("Orbit Fund"),
        ]
    }

    #[tokio::test]
    async fn load_skips_nameless_records() {
        let path = std::env::temp_dir().join(format!("vcdossier-inputs-{}.json", Uuid::now_v7()));
        tokio::fs::write(
            &path,
            r#"[{"Name": "Acme Ventures", "Contact Person": "Asha Rao"}, {"Name": "  "}]"#,
        )
        .await
        .unwrap();

        let loaded = load_firm_records(&path).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].contact_or_na(), "Asha Rao");

        tokio::fs::write(&path, r#"{"Name": "not an array"}"#).await.unwrap();
        let err = load_firm_records(&path).await.unwrap_err();
        assert!(matches!(err, DossierError::Validation { .. }));

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let path = std::env::temp_dir().join(format!("vcdossier-missing-{}.json", Uuid::now_v7()));
        let err = load_firm_records(&path).await.unwrap_err();
        assert!(matches!(err, DossierError::Io { .. }));
    }

    #[test]
    fn find_prefers_exact_then_case_insensitive() {
        let records = records();
        assert_eq!(find_record(&records, "Orbit Fund").map(|r| r.name.as_str()), Some("Orbit Fund"));
        assert_eq!(find_record(&records, " orbit fund ").map(|r| r.name.as_str()), Some("Orbit Fund"));
        assert!(find_record(&records, "Nope").is_none());
    }

    #[test]
    fn selection_by_name_and_limit() {
        let records = records();

        let all = select_records(&records, &[], Some(2)).unwrap();
        assert_eq!(all.len(), 2);

        let named = select_records(&records, &["orbit fund".into(), "Acme Ventures".into()], None).unwrap();
        assert_eq!(named[0].name, "Orbit Fund");
        assert_eq!(named[1].name, "Acme Ventures");

        assert!(select_records(&records, &["Nope".into()], None).is_err());
    }
}
