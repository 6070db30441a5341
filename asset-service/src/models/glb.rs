//! Minimal knowledge of the binary glTF container.
//!
//! The service never inspects scene content; it only needs to recognise a
//! GLB buffer coming back from the pipeline and, for the mock pipeline, to
//! produce a valid one.

pub const GLB_MIME_TYPE: &str = "model/gltf-binary";

const MAGIC: &[u8; 4] = b"glTF";
const VERSION: u32 = 2;
const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
const CHUNK_JSON: u32 = 0x4E4F_534A;

/// Whether `bytes` starts with a GLB v2 header whose declared length matches.
pub fn is_glb(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
        return false;
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let length = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    version == VERSION && length == bytes.len()
}

/// Build a GLB holding only a JSON chunk.
///
/// The chunk is padded with spaces to a 4-byte boundary as the container
/// format requires.
pub fn json_only(document: &serde_json::Value) -> Vec<u8> {
    let mut json = document.to_string().into_bytes();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }

    let total = HEADER_LEN + CHUNK_HEADER_LEN + json.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json);
    out
}
