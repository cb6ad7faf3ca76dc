use nom::IResult;

/// Parser result over string input, shared by the SMILES and SMARTS readers.
pub type Res<'a, T> = IResult<&'a str, T>;

mod smiles;
pub use smiles::*;

mod smarts;
pub use smarts::*;
