use std::path::Path;

use tokio::{
    fs::File,
    io::{self, AsyncBufReadExt, BufReader},
};

/// Read the non-blank lines of a file, trimmed, along with their 1-based line numbers
pub async fn read_lines(path: impl AsRef<Path>) -> io::Result<Vec<(usize, String)>> {
    let f = File::open(path).await?;
    let mut reader = BufReader::new(f).lines();

    let mut lines = Vec::new();
    let mut number = 0;

    while let Some(line) = reader.next_line().await? {
        number += 1;

        let line = line.trim();
        if !line.is_empty() {
            lines.push((number, line.to_string()));
        }
    }

    Ok(lines)
}
