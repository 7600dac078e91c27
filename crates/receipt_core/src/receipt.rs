use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Fields the server-side OCR pass pulled out of a receipt image.
///
/// Keys the client does not know about are kept in `other` so that saving a
/// result sends back exactly what the extractor produced.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFields {
    #[serde(default, alias = "shop_name", skip_serializing_if = "Option::is_none")]
    pub shop_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, alias = "TIN", skip_serializing_if = "Option::is_none")]
    pub tin: Option<String>,
    #[serde(
        default,
        alias = "amount_due",
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount_due: Option<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// Body of `POST /api/receipts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReceipt {
    pub file_path: String,
    pub original_name: String,
    pub extracted: ExtractedFields,
    pub job_id: String,
    pub month_year: String,
}

/// A receipt record as the backend stores it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedReceipt {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub extracted: ExtractedFields,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub month_year: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl SavedReceipt {
    /// Record echoed locally when the backend acknowledges a save without a body.
    pub fn from_new(receipt: &NewReceipt) -> Self {
        Self {
            id: None,
            file_path: receipt.file_path.clone(),
            original_name: Some(receipt.original_name.clone()),
            extracted: receipt.extracted.clone(),
            job_id: Some(receipt.job_id.clone()),
            month_year: Some(receipt.month_year.clone()),
            created_at: None,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "amount must be a string or a number, got {other}"
        ))),
    }
}
