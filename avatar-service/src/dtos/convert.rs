use crate::services::StoredOutput;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub success: bool,
    pub message: String,
    pub results: Vec<ConversionResult>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub file_name: String,
    pub file_path: String,
    pub mime_type: String,
}

impl ConvertResponse {
    pub fn converted(output: StoredOutput) -> Self {
        Self {
            success: true,
            message: "Image converted successfully".to_string(),
            results: vec![output.into()],
        }
    }
}

impl From<StoredOutput> for ConversionResult {
    fn from(output: StoredOutput) -> Self {
        Self {
            file_name: output.file_name,
            file_path: output.file_path,
            mime_type: output.mime_type.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_camel_case_result_fields() {
        let response = ConvertResponse::converted(StoredOutput {
            file_name: "notion_avatar_20250101_000000.png".to_string(),
            file_path: "/outputs/notion_avatar_20250101_000000.png".to_string(),
            mime_type: "image/png",
        });

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "success": true,
                "message": "Image converted successfully",
                "results": [{
                    "fileName": "notion_avatar_20250101_000000.png",
                    "filePath": "/outputs/notion_avatar_20250101_000000.png",
                    "mimeType": "image/png"
                }]
            })
        );
    }
}
