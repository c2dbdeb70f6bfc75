//! Declaration visibility.

use serde::Serialize;

/// Visibility of a declaration or member.
///
/// `Protected` is the default: visible inside the declaring module and its
/// submodules. `Private` narrows that to the declaring file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Access {
    Public,
    #[default]
    Protected,
    Private,
}

impl Access {
    pub fn keyword(self) -> &'static str {
        match self {
            Access::Public => "public",
            Access::Protected => "protected",
            Access::Private => "private",
        }
    }
}
