#[derive(Debug, Clone, Copy)]
/// Refers to an event by its primary key.
pub struct EventRef(pub i64);

#[derive(Debug, Clone, Copy)]
pub struct TeamRef(pub i64);
