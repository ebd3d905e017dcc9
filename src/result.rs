use serde::Serialize;

/// 响应信封：{"status": "success" | "failure", "message"?: ..., "data"?: ...}
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success_message(message: T) -> Self {
        Self {
            status: "success",
            message: Some(message),
            data: None,
        }
    }

    pub fn success_data(data: T) -> Self {
        Self {
            status: "success",
            message: None,
            data: Some(data),
        }
    }

    pub fn failure_message(message: T) -> Self {
        Self {
            status: "failure",
            message: Some(message),
            data: None,
        }
    }

    pub fn failure_data(data: T) -> Self {
        Self {
            status: "failure",
            message: None,
            data: Some(data),
        }
    }
}
