use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

/// Moves backwards in a file to beginning of a previous line. The newline right before the
/// current position is skipped, so that calling this at the end of `a\nb\n` lands on `b`.
pub async fn seek_line_backwards(
    file: &mut (impl AsyncSeek + AsyncRead + Unpin),
    buffer: &mut [u8],
) -> Result<(), io::Error> {
    let mut need_to_skip = 1usize;
    loop {
        let leftover = file.stream_position().await?;
        if leftover == 0 {
            return Ok(());
        }
        let next_chunk = u64::min(leftover, buffer.len() as u64) as usize;
        file.seek(std::io::SeekFrom::Current(-(next_chunk as i64)))
            .await?;

        file.read_exact(&mut buffer[..next_chunk]).await?;
        let newline = buffer[..next_chunk]
            .iter()
            .rev()
            .enumerate()
            .skip(need_to_skip)
            .find(|(_, value)| **value == b'\n');
        if let Some((index, _)) = newline {
            file.seek(std::io::SeekFrom::Current(-(index as i64)))
                .await?;
            return Ok(());
        }

        need_to_skip = need_to_skip.saturating_sub(next_chunk);
        file.seek(std::io::SeekFrom::Current(-(next_chunk as i64)))
            .await?;
    }
}

/// Reads the last line of a file without going through the rest of it. The trailing newline is
/// not included. Empty files give an empty string. The position is left at the end of the file.
pub async fn read_last_line(
    file: &mut (impl AsyncSeek + AsyncRead + Unpin),
    buffer: &mut [u8],
) -> Result<String, io::Error> {
    file.seek(std::io::SeekFrom::End(0)).await?;
    seek_line_backwards(file, buffer).await?;
    let mut last_line = String::new();
    file.read_to_string(&mut last_line).await?;
    Ok(last_line.trim_end_matches(&['\r', '\n'][..]).to_string())
}

/// Whether the last byte of a file is a newline. Empty files count as terminated. The position is
/// left at the end of the file.
pub async fn ends_with_newline(
    file: &mut (impl AsyncSeek + AsyncRead + Unpin),
) -> Result<bool, io::Error> {
    if file.seek(std::io::SeekFrom::End(0)).await? == 0 {
        return Ok(true);
    }
    file.seek(std::io::SeekFrom::End(-1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}
