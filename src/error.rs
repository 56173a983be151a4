use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds
    };
}

macro_rules! malformed_instruction_error {
    ($offset:expr, $msg:expr) => {
        crate::Error::MalformedInstruction {
            offset: $offset,
            message: $msg.to_string(),
        }
    };

    ($offset:expr, $fmt:expr, $($arg:tt)*) => {
        crate::Error::MalformedInstruction {
            offset: $offset,
            message: format!($fmt, $($arg)*),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants separate three classes of failure: reads past the end of the backing buffer,
/// corrupt data inside the buffer, and programming errors made by the caller (such as asking
/// for a try block that does not exist).
///
/// # Error Categories
///
/// ## Data Errors
/// - [`Error::OutOfBounds`] - A read would leave the backing buffer
/// - [`Error::MalformedInstruction`] - The instruction stream cannot be decoded at an offset
/// - [`Error::Malformed`] - Any other corrupt structure (LEB128, handler records, debug info)
///
/// ## Caller Errors
/// - [`Error::IndexOutOfRange`] - A try-block index outside of the table
///
/// ## I/O Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::Error`] - Other failures while acquiring a buffer
///
/// # Examples
///
/// ```rust
/// use dexscope::{Error, MethodBody, NoContext};
///
/// // A code record whose header claims 0x40 code units but the buffer ends early
/// let mut data = vec![0u8; 16];
/// data[12] = 0x40;
/// data.extend_from_slice(&[0x00, 0x00]);
///
/// let body = MethodBody::new(&data, 0, &NoContext)?;
/// match body.instructions().collect_all() {
///     Err(Error::OutOfBounds) => println!("instruction stream is truncated"),
///     Err(Error::MalformedInstruction { offset, message }) => {
///         println!("bad instruction at {offset:#x}: {message}")
///     }
///     Err(e) => println!("other error: {e}"),
///     Ok(instructions) => println!("{} instructions", instructions.len()),
/// }
/// # Ok::<(), dexscope::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The data is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An instruction could not be decoded.
    ///
    /// Raised for unknown opcodes, invalid payload identifiers and instructions that run
    /// past the end of the instruction stream declared by the code header. The offset is the
    /// absolute buffer offset of the first code unit of the offending instruction.
    #[error("Malformed instruction at offset {offset:#x}: {message}")]
    MalformedInstruction {
        /// Absolute byte offset of the instruction that failed to decode
        offset: usize,
        /// Description of the failure
        message: String,
    },

    /// An out of bound access was attempted while parsing the buffer.
    ///
    /// This error occurs when trying to read data beyond the end of the backing buffer.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// A try block was requested with an index outside of the table.
    ///
    /// This is a caller error, not a data format error.
    #[error("Try block index {index} is out of range for a table of {len} entries")]
    IndexOutOfRange {
        /// The requested index
        index: usize,
        /// The number of entries in the table
        len: usize,
    },

    /// Provided input was empty.
    ///
    /// This error occurs when a file or memory buffer handed to [`crate::DexFile`] has zero
    /// length.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur while opening a file to map it.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
