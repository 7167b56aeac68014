use serde::{Deserialize, Serialize};

/// JSON envelope shared by every response this service writes itself.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl<T> ApiResult<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            retry_after: None,
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            success: false,
            message: Some(message.to_string()),
            data: None,
            retry_after: None,
        }
    }

    pub fn retry_after(mut self, secs: u64) -> Self {
        self.retry_after = Some(secs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejection_shape() {
        let body = ApiResult::<()>::error("Too many requests").retry_after(12);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"success": false, "message": "Too many requests", "retryAfter": 12})
        );
    }

    #[test]
    fn success_shape() {
        let body = ApiResult::success(json!({"status": "ok"}));
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"success": true, "data": {"status": "ok"}})
        );
    }
}
