//! Text emitted for the libsmctrl masking API.
//!
//! Nothing here calls libsmctrl; these are the call shapes written into
//! rewritten sources.

use std::fmt;

use crate::mask::Mask;

/// Header declaring the libsmctrl API.
pub const HEADER: &str = "libsmctrl.h";

/// One libsmctrl call, without the trailing `;`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MaskCall {
    /// Default mask for every launch in the process.
    Global(Mask),
    /// Mask for every launch on `stream`.
    Stream { stream: String, mask: Mask },
    /// Mask for the next launch only.
    Next(Mask),
}

impl fmt::Display for MaskCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskCall::Global(mask) => write!(f, "libsmctrl_set_global_mask({})", mask),
            MaskCall::Stream { stream, mask } => {
                write!(f, "libsmctrl_set_stream_mask({},{})", stream, mask)
            }
            MaskCall::Next(mask) => write!(f, "libsmctrl_set_next_mask({})", mask),
        }
    }
}

/// Lines written ahead of any source content.
///
/// A static object's constructor sets the global mask at load time, so
/// the default applies before any kernel in the translation unit can
/// launch, wherever `main` lives.
pub fn prologue(global: Mask) -> String {
    format!(
        "#include <{header}>\n\
         // Use a constructor to call set_global_mask before any kernels can be launched\n\
         class GlobalMaskSetter {{\n\
         public:\n\
         \x20   GlobalMaskSetter() {{\n\
         \x20       {call};\n\
         \x20   }}\n\
         }};\n\
         GlobalMaskSetter setter;\n",
        header = HEADER,
        call = MaskCall::Global(global),
    )
}
