// THEORY:
// The `Pixel` module is the smallest unit the fill engine reasons about. It is a
// "dumb" data container for one RGBA record plus the two single-pixel facts the
// rest of the system needs: whether the pixel is opaque, and what it looks like
// once the fill has reached it.
//
// Everything that needs more than one pixel (rows, fractions, ordering) lives in
// the scanner and the filler.

pub mod pixel {
    pub type Byte = u8;
    pub type Bytes = Vec<Byte>;
    pub type Channel = Byte;

    /// Bytes per RGBA record.
    pub const CHANNELS: usize = 4;
    /// Offset of the alpha byte inside a record.
    pub const ALPHA_OFFSET: usize = 3;
    /// Blue channel value written into every filled pixel.
    pub const FILL_BLUE: Channel = 238;

    /// A "dumb" data container representing a single RGBA pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
        /// The alpha (transparency) channel value (0-255).
        pub alpha: Channel,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel, alpha: Channel) -> Self {
            Pixel {
                red,
                green,
                blue,
                alpha,
            }
        }

        /// A pixel takes part in the fill when its alpha is non-zero.
        pub fn is_opaque(&self) -> bool {
            self.alpha != 0
        }

        /// The colour this pixel takes once the fill level reaches it.
        ///
        /// Red is cleared, the old blue moves into green and blue becomes
        /// `FILL_BLUE`. Alpha is left alone so the outline of the image survives.
        pub fn filled(&self) -> Pixel {
            Pixel {
                red: 0,
                green: self.blue,
                blue: FILL_BLUE,
                alpha: self.alpha,
            }
        }

        /// Writes this pixel back into a 4-byte record.
        pub fn write_to(&self, record: &mut [Byte]) {
            record[0] = self.red;
            record[1] = self.green;
            record[2] = self.blue;
            record[3] = self.alpha;
        }
    }

    impl From<&[Byte]> for Pixel {
        fn from(bytes: &[Byte]) -> Self {
            if bytes.len() != CHANNELS {
                panic!("Cannot convert {} bytes into pixel.", bytes.len());
            }
            Pixel::new(bytes[0], bytes[1], bytes[2], bytes[3])
        }
    }

    impl From<Pixel> for Bytes {
        fn from(pixel: Pixel) -> Self {
            vec![pixel.red, pixel.green, pixel.blue, pixel.alpha]
        }
    }
}
