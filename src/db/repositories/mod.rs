pub mod score;

pub mod sql_fragment {
    pub const SCORE_FIELDS: &str = r#"
        id,
        player_name,
        score,
        created_at
    "#;
}
