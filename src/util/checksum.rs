/// Largest number of bytes that can be summed before `b` might overflow a `u32`
const ADLER_NMAX: usize = 5552;
const ADLER_MOD: u32 = 65521;

/// Adler-32 checksum (RFC 1950), used by the dex header to detect corruption
pub fn adler32(data: &[u8]) -> u32 {
    let mut a: u32 = 1;
    let mut b: u32 = 0;
    for chunk in data.chunks(ADLER_NMAX) {
        for byte in chunk {
            a += *byte as u32;
            b += a;
        }
        a %= ADLER_MOD;
        b %= ADLER_MOD;
    }
    (b << 16) | a
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_checksums() {
        assert_eq!(adler32(b""), 0x0000_0001);
        assert_eq!(adler32(b"a"), 0x0062_0062);
        assert_eq!(adler32(b"Wikipedia"), 0x11e6_0398);
    }

    #[test]
    fn long_input_does_not_overflow() {
        let data = vec![0xffu8; 100_000];
        let mut a: u64 = 1;
        let mut b: u64 = 0;
        for byte in &data {
            a = (a + *byte as u64) % ADLER_MOD as u64;
            b = (b + a) % ADLER_MOD as u64;
        }
        assert_eq!(adler32(&data), ((b << 16) | a) as u32);
    }
}
