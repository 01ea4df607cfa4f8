//! Bitmap that tracks the validity of the elements in the array

/// Bitmap stored in u64 words. The `i`th bit represents the `i`th element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitmap {
    words: Vec<u64>,
    num_bits: usize,
}

impl Bitmap {
    /// Create a new empty bitmap
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bits in the bitmap
    #[inline]
    pub fn len(&self) -> usize {
        self.num_bits
    }

    /// Returns true if the bitmap does not contain any bit
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_bits == 0
    }

    /// Append a bit to the end of the bitmap
    #[inline]
    pub fn push(&mut self, bit: bool) {
        let (word_index, bit_index) = (self.num_bits / 64, self.num_bits % 64);
        if bit_index == 0 {
            self.words.push(0);
        }
        if bit {
            self.words[word_index] |= 1_u64 << bit_index;
        }
        self.num_bits += 1;
    }

    /// Get the `index`th bit, returns `None` if the index is out of bound
    #[inline]
    pub fn get(&self, index: usize) -> Option<bool> {
        (index < self.num_bits).then(|| self.words[index / 64] & (1_u64 << (index % 64)) != 0)
    }

    /// Number of bits that are set to zero
    pub fn count_zeros(&self) -> usize {
        let ones: usize = self.words.iter().map(|word| word.count_ones() as usize).sum();
        self.num_bits - ones
    }

    /// Clear the bitmap, the allocated memory is kept
    #[inline]
    pub fn clear(&mut self) {
        self.words.clear();
        self.num_bits = 0;
    }

    /// Iterate the bits
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.num_bits).map(|index| self.words[index / 64] & (1_u64 << (index % 64)) != 0)
    }
}

impl FromIterator<bool> for Bitmap {
    fn from_iter<T: IntoIterator<Item = bool>>(iter: T) -> Self {
        let mut bitmap = Bitmap::new();
        iter.into_iter().for_each(|bit| bitmap.push(bit));
        bitmap
    }
}
