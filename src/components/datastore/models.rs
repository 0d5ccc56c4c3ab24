/// Columns changed by a partial update
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_details: Option<String>,
}

impl EventPatch {
    /// Patch overwriting the detail text
    pub fn details(text: impl Into<String>) -> Self {
        Self {
            additional_details: Some(text.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.additional_details.is_none()
    }
}
