mod slice;
mod string;
pub(crate) mod vle;

use super::{LCodec, RCodec, SluiceCodec, WCodec};
