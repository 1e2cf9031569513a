//! Incremental UTF-8 decoding for network chunks.
//!
//! Chunk boundaries fall anywhere, including inside a multi-byte sequence.
//! An incomplete trailing sequence is held back until the next chunk;
//! invalid bytes become U+FFFD.

/// Streaming UTF-8 decoder.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    partial: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes`, prefixed by whatever was held back from the previous
    /// call.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.partial);
        input.extend_from_slice(bytes);

        let mut out = String::with_capacity(input.len());
        let mut rest: &[u8] = &input;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid_up_to]));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid_up_to + len..];
                        }
                        None => {
                            // Incomplete sequence at the end: wait for more bytes.
                            self.partial = rest[valid_up_to..].to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Decode whatever is still held back, lossily.
    pub fn finish(&mut self) -> String {
        if self.partial.is_empty() {
            return String::new();
        }
        let partial = std::mem::take(&mut self.partial);
        String::from_utf8_lossy(&partial).into_owned()
    }
}
