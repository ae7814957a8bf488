//! LZF block codec.
//!
//! Control byte `c < 32` starts a literal run of `c + 1` bytes. Anything else is a
//! back reference: the top three bits hold `length - 2` (7 means one extra length
//! byte follows), the low five bits plus the next byte hold `distance - 1`.
use crate::error::{DecodeError, Result};

const MAX_LITERAL: usize = 32;
const MIN_MATCH: usize = 3;
const MAX_MATCH: usize = 7 + 255 + 2;
const MAX_DISTANCE: usize = 0x1fff + 1;
const HASH_BITS: u32 = 14;

/// Decompress `input`, which must expand to exactly `out_len` bytes.
pub fn decompress(input: &[u8], out_len: usize) -> Result<Vec<u8>> {
    // A three byte back reference expands furthest.
    let reachable = input.len().saturating_mul(MAX_MATCH.div_ceil(3));
    let mut out = Vec::with_capacity(out_len.min(reachable));
    let mut ip = 0;

    while ip < input.len() {
        let ctrl = input[ip] as usize;
        ip += 1;

        if ctrl < MAX_LITERAL {
            let len = ctrl + 1;
            let end = ip + len;
            if end > input.len() {
                return Err(DecodeError::corrupt("LZF literal run reads past end of input"));
            }
            if out.len() + len > out_len {
                return Err(DecodeError::corrupt("LZF literal run writes past end of output"));
            }
            out.extend_from_slice(&input[ip..end]);
            ip = end;
            continue;
        }

        let mut len = ctrl >> 5;
        if len == 7 {
            let extra = *input
                .get(ip)
                .ok_or_else(|| DecodeError::corrupt("LZF length byte missing"))?;
            len += extra as usize;
            ip += 1;
        }
        let low = *input
            .get(ip)
            .ok_or_else(|| DecodeError::corrupt("LZF offset byte missing"))?;
        ip += 1;

        let distance = ((ctrl & 0x1f) << 8) + low as usize + 1;
        if distance > out.len() {
            return Err(DecodeError::corrupt("LZF back reference before start of output"));
        }
        let len = len + 2;
        if out.len() + len > out_len {
            return Err(DecodeError::corrupt("LZF back reference writes past end of output"));
        }

        // Byte-wise copy: source and destination may overlap.
        let start = out.len() - distance;
        for k in 0..len {
            let b = out[start + k];
            out.push(b);
        }
    }

    if out.len() != out_len {
        return Err(DecodeError::corrupt(format!(
            "LZF output is {} bytes, header declares {}",
            out.len(),
            out_len
        )));
    }
    Ok(out)
}

/// Greedy LZF compressor with one hash candidate per position.
pub fn compress(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() + input.len() / MAX_LITERAL + 1);
    let mut table = vec![usize::MAX; 1 << HASH_BITS];
    let mut literal_start = 0;
    let mut i = 0;

    while i + MIN_MATCH <= input.len() {
        let slot = hash(&input[i..i + MIN_MATCH]);
        let candidate = table[slot];
        table[slot] = i;

        let is_match = candidate != usize::MAX
            && i - candidate <= MAX_DISTANCE
            && input[candidate..candidate + MIN_MATCH] == input[i..i + MIN_MATCH];
        if !is_match {
            i += 1;
            continue;
        }

        let limit = (input.len() - i).min(MAX_MATCH);
        let mut len = MIN_MATCH;
        while len < limit && input[candidate + len] == input[i + len] {
            len += 1;
        }

        push_literals(&mut out, &input[literal_start..i]);
        push_back_reference(&mut out, i - candidate, len);
        i += len;
        literal_start = i;
    }

    push_literals(&mut out, &input[literal_start..]);
    out
}

fn hash(bytes: &[u8]) -> usize {
    let v = (bytes[0] as u32) << 16 | (bytes[1] as u32) << 8 | bytes[2] as u32;
    (v.wrapping_mul(2654435761) >> (32 - HASH_BITS)) as usize
}

fn push_literals(out: &mut Vec<u8>, literals: &[u8]) {
    for chunk in literals.chunks(MAX_LITERAL) {
        out.push((chunk.len() - 1) as u8);
        out.extend_from_slice(chunk);
    }
}

fn push_back_reference(out: &mut Vec<u8>, distance: usize, match_len: usize) {
    let offset = distance - 1;
    let len = match_len - 2;
    if len < 7 {
        out.push(((len << 5) | (offset >> 8)) as u8);
    } else {
        out.push(((7 << 5) | (offset >> 8)) as u8);
        out.push((len - 7) as u8);
    }
    out.push((offset & 0xff) as u8);
}
