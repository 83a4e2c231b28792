use snafu::Snafu;

use crate::datum::DatumKind;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("cannot encode {kind:?} datum: {reason}"))]
    Encode { kind: DatumKind, reason: String },

    #[snafu(display("cannot compare {left:?} with {right:?}"))]
    Compare { left: DatumKind, right: DatumKind },

    #[snafu(display("cannot merge collectors of width {left} and {right}"))]
    SketchMerge { left: usize, right: usize },

    #[snafu(display("record set read failed: {message}"))]
    SampleRead { message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
