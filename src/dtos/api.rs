use serde::Serialize;

/// `{status, message, data}` envelope used by every endpoint.
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: String,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error_with(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data: None,
        }
    }
}
