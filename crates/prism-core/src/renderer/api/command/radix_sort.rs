// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Stable LSD radix sort of `u64` keys with a parallel value array.

const RADIX_BITS: u32 = 11;
const RADIX: usize = 1 << RADIX_BITS;
const RADIX_MASK: u64 = (RADIX as u64) - 1;
const PASSES: u32 = u64::BITS.div_ceil(RADIX_BITS);

/// Sorts `keys` ascending and applies the same permutation to `values`.
///
/// The sort is stable: equal keys keep their relative order. `temp_keys` and
/// `temp_values` are scratch storage; they are resized as needed and can be
/// kept between calls to avoid reallocating.
///
/// Passes where every key falls into the same bucket are skipped.
///
/// # Panics
///
/// Panics if `keys` and `values` have different lengths.
pub fn radix_sort64<V: Copy>(
    keys: &mut [u64],
    values: &mut [V],
    temp_keys: &mut Vec<u64>,
    temp_values: &mut Vec<V>,
) {
    assert_eq!(keys.len(), values.len(), "keys and values must match");
    let len = keys.len();
    if len < 2 {
        return;
    }

    temp_keys.clear();
    temp_keys.extend_from_slice(keys);
    temp_values.clear();
    temp_values.extend_from_slice(values);

    let mut histogram = [0u32; RADIX];
    // Ping-pong between the caller's buffers and the scratch buffers.
    let mut in_temp = false;

    for pass in 0..PASSES {
        let shift = pass * RADIX_BITS;
        histogram.fill(0);

        let source: &[u64] = if in_temp { &temp_keys[..] } else { &keys[..] };
        for &key in source {
            histogram[((key >> shift) & RADIX_MASK) as usize] += 1;
        }

        let first = ((source[0] >> shift) & RADIX_MASK) as usize;
        if histogram[first] as usize == len {
            continue;
        }

        let mut offset = 0u32;
        for count in histogram.iter_mut() {
            let c = *count;
            *count = offset;
            offset += c;
        }

        if in_temp {
            scatter_pass(&temp_keys[..], &temp_values[..], keys, values, &mut histogram, shift);
        } else {
            scatter_pass(keys, values, &mut temp_keys[..], &mut temp_values[..], &mut histogram, shift);
        }
        in_temp = !in_temp;
    }

    if in_temp {
        keys.copy_from_slice(&temp_keys[..]);
        values.copy_from_slice(&temp_values[..]);
    }
}

fn scatter_pass<V: Copy>(
    src_keys: &[u64],
    src_values: &[V],
    dst_keys: &mut [u64],
    dst_values: &mut [V],
    offsets: &mut [u32; RADIX],
    shift: u32,
) {
    for (&key, &value) in src_keys.iter().zip(src_values) {
        let bucket = ((key >> shift) & RADIX_MASK) as usize;
        let dst = offsets[bucket] as usize;
        dst_keys[dst] = key;
        dst_values[dst] = value;
        offsets[bucket] += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sort(keys: &mut [u64], values: &mut [u32]) {
        radix_sort64(keys, values, &mut Vec::new(), &mut Vec::new());
    }

    #[test]
    fn sorts_keys_and_moves_values() {
        let mut keys = vec![5u64, u64::MAX, 0, 1 << 40, 3];
        let mut values: Vec<u32> = (0..keys.len() as u32).collect();
        sort(&mut keys, &mut values);
        assert_eq!(keys, vec![0, 3, 5, 1 << 40, u64::MAX]);
        assert_eq!(values, vec![2, 4, 0, 3, 1]);
    }

    #[test]
    fn equal_keys_keep_submission_order() {
        let mut keys = vec![7u64, 1, 7, 1, 7];
        let mut values = vec![0u32, 1, 2, 3, 4];
        sort(&mut keys, &mut values);
        assert_eq!(values, vec![1, 3, 0, 2, 4]);
    }

    #[test]
    fn matches_std_stable_sort_on_pseudo_random_input() {
        let mut state = 0x2545_f491_4f6c_dd1du64;
        let mut keys: Vec<u64> = (0..5000)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                // Narrow the range so duplicates occur.
                state & 0xff00_0000_00ff_ffff
            })
            .collect();
        let mut values: Vec<u32> = (0..keys.len() as u32).collect();

        let mut expected: Vec<(u64, u32)> = keys.iter().copied().zip(values.iter().copied()).collect();
        expected.sort_by_key(|(k, _)| *k);

        let mut temp_keys = Vec::new();
        let mut temp_values = Vec::new();
        radix_sort64(&mut keys, &mut values, &mut temp_keys, &mut temp_values);
        let actual: Vec<(u64, u32)> = keys.into_iter().zip(values).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn trivial_inputs_are_untouched() {
        let mut keys: Vec<u64> = vec![];
        let mut values: Vec<u32> = vec![];
        sort(&mut keys, &mut values);
        assert!(keys.is_empty());

        let mut keys = vec![9u64; 4];
        let mut values = vec![3u32, 2, 1, 0];
        sort(&mut keys, &mut values);
        assert_eq!(values, vec![3, 2, 1, 0]);
    }
}
