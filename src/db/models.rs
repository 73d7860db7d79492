use chrono::NaiveDateTime;

// Storage rows. Wire shapes live in `serializers`.

/// Account row. The password hash stays inside `AccountStore` and is never
/// loaded into this struct.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: i64,
    pub email: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: i64,
    pub username: String,
    pub owner_id: i64,
    pub avatar_image: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub author_id: i64,
    pub image: Option<String>,
    /// Sorted ascending, no duplicates.
    pub liked_by: Vec<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub author_id: i64,
    pub post_id: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Caller-supplied timestamps for a create.
#[derive(Debug, Clone, Copy)]
pub struct Timestamps {
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Timestamps {
    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            created_at: now,
            updated_at: now,
        }
    }
}
