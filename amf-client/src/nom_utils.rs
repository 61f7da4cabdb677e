use crate::errors::Error;
use nom::bytes::complete::take;
use nom::combinator::map_res;
use nom::error::{ErrorKind, make_error};
use nom::{Err, IResult};

/// The result of every AMF parser
pub type AMFResult<'a, T> = IResult<&'a [u8], T, Error<'a>>;

pub(crate) fn take_str(i: &[u8], length: u32) -> AMFResult<'_, &str> {
    map_res(take(length), std::str::from_utf8)(i)
}

/// Fail with a nom error of the given kind at `i`
pub(crate) fn fail<T>(i: &[u8], kind: ErrorKind) -> AMFResult<'_, T> {
    Err(Err::Error(make_error(i, kind)))
}

/// Fail with a specific decoding error
pub(crate) fn fail_with<'a, T>(e: Error<'a>) -> AMFResult<'a, T> {
    Err(Err::Error(e))
}

/// Write a u16 length prefixed utf8 string
pub(crate) fn write_string(out: &mut Vec<u8>, s: &str) -> Result<(), Error<'static>> {
    let length = u16::try_from(s.len()).map_err(|_| Error::ValueTooLarge)?;
    out.extend(length.to_be_bytes());
    out.extend(s.as_bytes());
    Ok(())
}
