/// byte sink for encoded instructions. `offset` is the address the next
/// byte will be placed at, used to resolve relative branches
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CodeBuffer {
    origin: u16,
    data: Vec<u8>,
}

impl CodeBuffer {
    pub fn new(origin: u16) -> Self {
        CodeBuffer {
            origin,
            data: Vec::new(),
        }
    }

    pub fn origin(&self) -> u16 {
        self.origin
    }

    /// current write offset
    pub fn offset(&self) -> u16 {
        self.origin.wrapping_add(self.data.len() as u16)
    }

    pub fn push(&mut self, b: u8) {
        self.data.push(b);
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}
