//! Line-oriented input files
//!
//! STRING distributes its tables gzip compressed; any file whose first two bytes
//! are the gzip magic number is decompressed transparently.

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Open a text file for buffered line reading, decompressing gzip content
pub fn open_text(path: impl AsRef<Path>) -> io::Result<Box<dyn BufRead>> {
    let mut file = File::open(path.as_ref())?;

    let mut magic = [0u8; 2];
    let read = file.read(&mut magic)?;
    file.seek(SeekFrom::Start(0))?;

    if read == 2 && magic == GZIP_MAGIC {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// True for lines that carry no data: blank, `#` or `//` comments
pub fn is_ignorable(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with('#') || line.starts_with("//")
}
