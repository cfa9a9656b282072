//! Deterministic SAS query-string generation for Queue and Table resources
//! (§4.6).

use chrono::{DateTime, Utc};

use crate::auth::shared_key::sign;
use crate::auth::QUERY_ENCODE_SET;
use crate::date::format_sas_datetime;
use crate::error::Error;

/// Queue SAS permission flags, emitted in `r/a/u/p` order (§4.6).
#[derive(Debug, Clone, Copy, Default)]
pub struct QueuePermissions {
    pub read: bool,
    pub add: bool,
    pub update: bool,
    pub process: bool,
}

impl QueuePermissions {
    fn as_str(self) -> String {
        let mut s = String::new();
        if self.read {
            s.push('r');
        }
        if self.add {
            s.push('a');
        }
        if self.update {
            s.push('u');
        }
        if self.process {
            s.push('p');
        }
        s
    }
}

/// Table SAS permission flags, emitted in `r/a/u/d` order (§4.6).
#[derive(Debug, Clone, Copy, Default)]
pub struct TablePermissions {
    pub read: bool,
    pub add: bool,
    pub update: bool,
    pub delete: bool,
}

impl TablePermissions {
    fn as_str(self) -> String {
        let mut s = String::new();
        if self.read {
            s.push('r');
        }
        if self.add {
            s.push('a');
        }
        if self.update {
            s.push('u');
        }
        if self.delete {
            s.push('d');
        }
        s
    }
}

/// Inputs shared by both Queue and Table SAS generation.
pub struct SasOptions {
    pub version: String,
    pub start: Option<DateTime<Utc>>,
    pub expiry: DateTime<Utc>,
    /// Signed access policy identifier (`si`). The original source set
    /// `se` here by mistake; this implementation sets `si` (§9).
    pub access_policy: Option<String>,
}

/// Generates a Queue SAS query string. Returned already URL-encoded, ready
/// to append to a request URL.
pub fn generate_queue_sas(
    account: &str,
    key: &[u8],
    queue: &str,
    permissions: QueuePermissions,
    options: &SasOptions,
) -> Result<String, Error> {
    let sp = permissions.as_str();
    let st = options.start.map(|d| format_sas_datetime(&d)).unwrap_or_default();
    let se = format_sas_datetime(&options.expiry);
    let resource = format!("/{}/{}", account.to_lowercase(), queue);
    let si = options.access_policy.clone().unwrap_or_default();
    let sv = options.version.clone();

    let string_to_sign = format!("{sp}\n{st}\n{se}\n{resource}\n{si}\n{sv}");
    let signature = sign(&string_to_sign, key)?;

    Ok(build_query(&[
        ("sv", &sv),
        ("se", &se),
        ("sp", &sp),
        ("st", &st),
        ("si", &si),
        ("sig", &signature),
    ]))
}

/// Generates a Table SAS query string, with `tn`, `spk`, `srk`, `epk`, `erk`
/// range fields in addition to the Queue fields (§4.6).
#[allow(clippy::too_many_arguments)]
pub fn generate_table_sas(
    account: &str,
    key: &[u8],
    table: &str,
    permissions: TablePermissions,
    options: &SasOptions,
    start_partition_key: Option<&str>,
    start_row_key: Option<&str>,
    end_partition_key: Option<&str>,
    end_row_key: Option<&str>,
) -> Result<String, Error> {
    let sp = permissions.as_str();
    let st = options.start.map(|d| format_sas_datetime(&d)).unwrap_or_default();
    let se = format_sas_datetime(&options.expiry);
    let table_lower = table.to_lowercase();
    let resource = format!("/{}/{}", account.to_lowercase(), table_lower);
    let si = options.access_policy.clone().unwrap_or_default();
    let sv = options.version.clone();
    let spk = start_partition_key.unwrap_or("");
    let srk = start_row_key.unwrap_or("");
    let epk = end_partition_key.unwrap_or("");
    let erk = end_row_key.unwrap_or("");

    let string_to_sign = format!("{sp}\n{st}\n{se}\n{resource}\n{si}\n{sv}\n{spk}\n{srk}\n{epk}\n{erk}");
    let signature = sign(&string_to_sign, key)?;

    Ok(build_query(&[
        ("sv", &sv),
        ("tn", table),
        ("se", &se),
        ("sp", &sp),
        ("st", &st),
        ("si", &si),
        ("spk", spk),
        ("srk", srk),
        ("epk", epk),
        ("erk", erk),
        ("sig", &signature),
    ]))
}

/// Emits only the non-empty fields, URL-encoding each value.
fn build_query(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{key}={}", percent_encoding::utf8_percent_encode(value, QUERY_ENCODE_SET)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    const DEV_KEY: &str =
        "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

    #[test]
    fn queue_sas_sets_si_not_se_twice() {
        let key = BASE64.decode(DEV_KEY).unwrap();
        let expiry = Utc::now() + chrono::Duration::hours(1);
        let options = SasOptions { version: "2014-02-14".into(), start: None, expiry, access_policy: Some("my-policy".into()) };
        let sas = generate_queue_sas("jungle", &key, "orders", QueuePermissions { read: true, ..Default::default() }, &options)
            .unwrap();

        assert!(sas.contains("si=my-policy"));
        let se_count = sas.matches("se=").count();
        assert_eq!(se_count, 1);
    }

    #[test]
    fn queue_sas_permission_order_is_raup() {
        let permissions = QueuePermissions { read: true, add: true, update: true, process: true };
        assert_eq!(permissions.as_str(), "raup");
    }

    #[test]
    fn table_sas_includes_range_keys() {
        let key = BASE64.decode(DEV_KEY).unwrap();
        let expiry = Utc::now() + chrono::Duration::hours(1);
        let options = SasOptions { version: "2014-02-14".into(), start: None, expiry, access_policy: None };
        let sas = generate_table_sas(
            "jungle",
            &key,
            "Orders",
            TablePermissions { read: true, ..Default::default() },
            &options,
            Some("p0"),
            None,
            Some("p9"),
            None,
        )
        .unwrap();

        assert!(sas.contains("spk=p0"));
        assert!(sas.contains("epk=p9"));
        assert!(sas.contains("tn=Orders"));
    }
}
