use crate::errors::{DexError, DexResult};
use crate::{Dex, DexIndex, Index, PrettyPrint};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StringIdItem(pub(crate) String);

impl DexIndex for Index<StringIdItem> {
    type T = StringIdItem;

    fn get(self, dex: &Dex) -> DexResult<&Self::T> {
        dex.string_id_items
            .get(self.as_usize())
            .ok_or_else(|| DexError::ResNotFound("StringIdItem".to_string()))
    }
}

impl StringIdItem {
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PrettyPrint for StringIdItem {
    fn pp(&self, f: &mut fmt::Formatter, _dex: &Dex) -> DexResult<()> {
        write!(f, "\"{}\"", self.0.replace('\n', "\\n"))?;
        Ok(())
    }
}
