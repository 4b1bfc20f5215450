use serde::Serialize;

/// Loading flags of the two interaction classes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Status {
    pub uploading: bool,
    pub replying: bool,
}
