//! CityHash64 (v1.1)
//!
//! The 64-bit CityHash used by the `CITY64_*` hash families. Peers compute
//! bins with the same function, so this must stay bit-exact with the
//! reference algorithm. All arithmetic wraps.

const K0: u64 = 0xc3a5_c85c_97cb_3127;
const K1: u64 = 0xb492_b66f_be98_f273;
const K2: u64 = 0x9ae1_6a3b_2f90_404f;
const K_MUL: u64 = 0x9ddf_ea08_eb38_2d69;

#[inline]
fn fetch64(s: &[u8], at: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&s[at..at + 8]);
    u64::from_le_bytes(word)
}

#[inline]
fn fetch32(s: &[u8], at: usize) -> u64 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&s[at..at + 4]);
    u64::from(u32::from_le_bytes(word))
}

#[inline]
fn shift_mix(v: u64) -> u64 {
    v ^ (v >> 47)
}

#[inline]
fn hash_len16_mul(u: u64, v: u64, mul: u64) -> u64 {
    let mut a = (u ^ v).wrapping_mul(mul);
    a ^= a >> 47;
    let mut b = (v ^ a).wrapping_mul(mul);
    b ^= b >> 47;
    b.wrapping_mul(mul)
}

#[inline]
fn hash_len16(u: u64, v: u64) -> u64 {
    hash_len16_mul(u, v, K_MUL)
}

fn hash_len0_to16(s: &[u8]) -> u64 {
    let len = s.len();
    if len >= 8 {
        let mul = K2.wrapping_add(len as u64 * 2);
        let a = fetch64(s, 0).wrapping_add(K2);
        let b = fetch64(s, len - 8);
        let c = b.rotate_right(37).wrapping_mul(mul).wrapping_add(a);
        let d = a.rotate_right(25).wrapping_add(b).wrapping_mul(mul);
        return hash_len16_mul(c, d, mul);
    }
    if len >= 4 {
        let mul = K2.wrapping_add(len as u64 * 2);
        let a = fetch32(s, 0);
        return hash_len16_mul((len as u64).wrapping_add(a << 3), fetch32(s, len - 4), mul);
    }
    if len > 0 {
        let a = u32::from(s[0]);
        let b = u32::from(s[len >> 1]);
        let c = u32::from(s[len - 1]);
        let y = a.wrapping_add(b << 8);
        let z = (len as u32).wrapping_add(c << 2);
        return shift_mix(u64::from(y).wrapping_mul(K2) ^ u64::from(z).wrapping_mul(K0))
            .wrapping_mul(K2);
    }
    K2
}

fn hash_len17_to32(s: &[u8]) -> u64 {
    let len = s.len();
    let mul = K2.wrapping_add(len as u64 * 2);
    let a = fetch64(s, 0).wrapping_mul(K1);
    let b = fetch64(s, 8);
    let c = fetch64(s, len - 8).wrapping_mul(mul);
    let d = fetch64(s, len - 16).wrapping_mul(K2);
    hash_len16_mul(
        a.wrapping_add(b)
            .rotate_right(43)
            .wrapping_add(c.rotate_right(30))
            .wrapping_add(d),
        a.wrapping_add(b.wrapping_add(K2).rotate_right(18))
            .wrapping_add(c),
        mul,
    )
}

fn weak_hash_len32_with_seeds(s: &[u8], at: usize, a: u64, b: u64) -> (u64, u64) {
    let w = fetch64(s, at);
    let x = fetch64(s, at + 8);
    let y = fetch64(s, at + 16);
    let z = fetch64(s, at + 24);

    let mut a = a.wrapping_add(w);
    let mut b = b.wrapping_add(a).wrapping_add(z).rotate_right(21);
    let c = a;
    a = a.wrapping_add(x).wrapping_add(y);
    b = b.wrapping_add(a.rotate_right(44));
    (a.wrapping_add(z), b.wrapping_add(c))
}

fn hash_len33_to64(s: &[u8]) -> u64 {
    let len = s.len();
    let mul = K2.wrapping_add(len as u64 * 2);
    let a = fetch64(s, 0).wrapping_mul(K2);
    let b = fetch64(s, 8);
    let c = fetch64(s, len - 24);
    let d = fetch64(s, len - 32);
    let e = fetch64(s, 16).wrapping_mul(K2);
    let f = fetch64(s, 24).wrapping_mul(9);
    let g = fetch64(s, len - 8);
    let h = fetch64(s, len - 16).wrapping_mul(mul);

    let u = a
        .wrapping_add(g)
        .rotate_right(43)
        .wrapping_add(b.rotate_right(30).wrapping_add(c).wrapping_mul(9));
    let v = (a.wrapping_add(g) ^ d).wrapping_add(f).wrapping_add(1);
    let w = u
        .wrapping_add(v)
        .wrapping_mul(mul)
        .swap_bytes()
        .wrapping_add(h);
    let x = e.wrapping_add(f).rotate_right(42).wrapping_add(c);
    let y = v
        .wrapping_add(w)
        .wrapping_mul(mul)
        .swap_bytes()
        .wrapping_add(g)
        .wrapping_mul(mul);
    let z = e.wrapping_add(f).wrapping_add(c);
    let a = x
        .wrapping_add(z)
        .wrapping_mul(mul)
        .wrapping_add(y)
        .swap_bytes()
        .wrapping_add(b);
    let b = shift_mix(
        z.wrapping_add(a)
            .wrapping_mul(mul)
            .wrapping_add(d)
            .wrapping_add(h),
    )
    .wrapping_mul(mul);
    b.wrapping_add(x)
}

/// Hash a byte string with CityHash64.
pub fn city_hash64(s: &[u8]) -> u64 {
    let len = s.len();
    if len <= 32 {
        if len <= 16 {
            return hash_len0_to16(s);
        }
        return hash_len17_to32(s);
    }
    if len <= 64 {
        return hash_len33_to64(s);
    }

    // Keep 56 bytes of state: v, w, x, y and z.
    let mut x = fetch64(s, len - 40);
    let mut y = fetch64(s, len - 16).wrapping_add(fetch64(s, len - 56));
    let mut z = hash_len16(
        fetch64(s, len - 48).wrapping_add(len as u64),
        fetch64(s, len - 24),
    );
    let mut v = weak_hash_len32_with_seeds(s, len - 64, len as u64, z);
    let mut w = weak_hash_len32_with_seeds(s, len - 32, y.wrapping_add(K1), x);
    x = x.wrapping_mul(K1).wrapping_add(fetch64(s, 0));

    // Process 64-byte chunks from the front; the tail was folded in above.
    let mut remaining = (len - 1) & !63;
    let mut at = 0;
    loop {
        x = x
            .wrapping_add(y)
            .wrapping_add(v.0)
            .wrapping_add(fetch64(s, at + 8))
            .rotate_right(37)
            .wrapping_mul(K1);
        y = y
            .wrapping_add(v.1)
            .wrapping_add(fetch64(s, at + 48))
            .rotate_right(42)
            .wrapping_mul(K1);
        x ^= w.1;
        y = y.wrapping_add(v.0).wrapping_add(fetch64(s, at + 40));
        z = z.wrapping_add(w.0).rotate_right(33).wrapping_mul(K1);
        v = weak_hash_len32_with_seeds(s, at, v.1.wrapping_mul(K1), x.wrapping_add(w.0));
        w = weak_hash_len32_with_seeds(
            s,
            at + 32,
            z.wrapping_add(w.1),
            y.wrapping_add(fetch64(s, at + 16)),
        );
        std::mem::swap(&mut z, &mut x);
        at += 64;
        remaining -= 64;
        if remaining == 0 {
            break;
        }
    }

    hash_len16(
        hash_len16(v.0, w.0)
            .wrapping_add(shift_mix(y).wrapping_mul(K1))
            .wrapping_add(z),
        hash_len16(v.1, w.1).wrapping_add(x),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_hashes_to_k2() {
        assert_eq!(city_hash64(b""), K2, "CityHash64 of the empty string is k2");
    }

    /// Input buffer of the reference CityHash test suite
    fn reference_data(size: usize) -> Vec<u8> {
        let mut out = vec![0u8; size];
        let mut a = 9u64;
        let mut b = 777u64;
        for (i, byte) in out.iter_mut().enumerate() {
            a = a.wrapping_add(b);
            b = b.wrapping_add(a);
            a = (a ^ (a >> 41)).wrapping_mul(K0);
            b = (b ^ (b >> 41)).wrapping_mul(K0).wrapping_add(i as u64);
            *byte = (b >> 37) as u8;
        }
        out
    }

    #[test]
    fn test_reference_vectors_for_every_length_branch() {
        // Length n hashes data[n * n..n * n + n]
        let vectors: [(usize, u64); 16] = [
            (0, 0x9ae1_6a3b_2f90_404f),
            (1, 0x5411_50e8_7f41_5e96),
            (3, 0xef92_3a7a_1af7_8eab),
            (4, 0x11df_5925_96f4_1d88),
            (7, 0x1b5a_063f_b4c7_f9f1),
            (8, 0xa0f1_0149_a0e5_38d6),
            (16, 0x03ea_d5f2_1d34_4056),
            (17, 0x6abb_fde3_7ee0_3b5b),
            (32, 0x0782_fa1b_08b4_75e7),
            (33, 0xc5dc_19b8_76d3_7a80),
            (64, 0xe884_1992_2b87_176f),
            (65, 0x1051_91e0_ec8f_7f60),
            (128, 0xb2e2_3e81_16c2_ba9f),
            (129, 0x8aa7_7f52_d786_8eb9),
            (200, 0x07fc_9800_6e25_cac9),
            (298, 0x74c0_b8a6_821f_aafe),
        ];
        let data = reference_data(298 * 298 + 298);

        for (len, expected) in vectors {
            let start = len * len;
            assert_eq!(
                city_hash64(&data[start..start + len]),
                expected,
                "CityHash64 v1.1 mismatch at length {}",
                len
            );
        }
    }

    #[test]
    fn test_every_length_branch_is_deterministic() {
        let data: Vec<u8> = (0..300u32).map(|i| (i * 7 + 3) as u8).collect();

        // 1-3, 4-7, 8-16, 17-32, 33-64 and the 64-byte chunk loop
        for len in [1, 3, 4, 7, 8, 16, 17, 32, 33, 64, 65, 128, 129, 300] {
            let first = city_hash64(&data[..len]);
            let second = city_hash64(&data[..len]);
            assert_eq!(first, second, "length {} must hash deterministically", len);
        }
    }

    #[test]
    fn test_prefixes_hash_differently() {
        let data: Vec<u8> = (0..200u32).map(|i| i as u8).collect();
        let hashes: std::collections::HashSet<u64> =
            (0..=200).map(|len| city_hash64(&data[..len])).collect();

        assert_eq!(hashes.len(), 201, "Every prefix length should produce a distinct hash");
    }

    #[test]
    fn test_single_byte_change_avalanches() {
        let a = b"cluster/topic/a/b/c/with/a/long/enough/name/for/the/chunk/loop/to/run".to_vec();
        let mut b = a.clone();
        b[10] ^= 0x01;

        let diff = (city_hash64(&a) ^ city_hash64(&b)).count_ones();
        assert!(
            (16..=48).contains(&diff),
            "A one-bit change should flip roughly half of the output bits, flipped {}",
            diff
        );
    }
}
