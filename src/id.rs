use uuid::Uuid;

pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

/// Ids synthesized by the mock store carry a prefix so diagnostics can tell
/// them apart from backend-assigned ids.
pub fn new_mock_id() -> String {
    format!("mock-{}", Uuid::now_v7())
}
