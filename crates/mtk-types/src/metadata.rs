use serde::Serialize;

use crate::units::DECIMALS;

/// Read-only token metadata, fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TokenMetadata {
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimals: u8,
}

impl TokenMetadata {
    /// Metadata of the MyToken deployment.
    pub const MY_TOKEN: TokenMetadata = TokenMetadata {
        name: "MyToken",
        symbol: "MTK",
        decimals: DECIMALS,
    };
}

impl Default for TokenMetadata {
    fn default() -> Self {
        Self::MY_TOKEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_my_token() {
        let meta = TokenMetadata::default();
        assert_eq!(meta.name, "MyToken");
        assert_eq!(meta.symbol, "MTK");
        assert_eq!(meta.decimals, 18);
    }
}
