//! Small numeric kernels shared by the feature maps and the MLP.

#[inline]
pub fn vector_inner_product(x: &[f32], y: &[f32]) -> f32 {
    debug_assert_eq!(x.len(), y.len());
    let mut prod = 0.0f32;
    for (a, b) in x.iter().zip(y) {
        prod += a * b;
    }
    prod
}

/// Turns a zero-padded, interleaved `(width + 1) x (height + 1)` buffer into
/// its integral image, independently per channel.
///
/// Row 0 and column 0 must be zero; pixel `(x, y)` lives at
/// `((y + 1) * (width + 1) + x + 1) * channels`.
pub fn integral_in_place(data: &mut [i64], width: usize, height: usize, channels: usize) {
    let stride = (width + 1) * channels;
    debug_assert_eq!(data.len(), stride * (height + 1));

    for y in 1..=height {
        let row = y * stride;
        for x in 1..=width {
            let idx = row + x * channels;
            for c in 0..channels {
                let i = idx + c;
                data[i] += data[i - channels] + data[i - stride] - data[i - stride - channels];
            }
        }
    }
}

/// Sum over the pixel rectangle `[x, x + w) x [y, y + h)` of one channel of
/// an integral image built by [`integral_in_place`].
#[inline]
#[allow(clippy::too_many_arguments)]
pub fn rect_sum(
    integral: &[i64],
    width: usize,
    channels: usize,
    channel: usize,
    x: usize,
    y: usize,
    w: usize,
    h: usize,
) -> i64 {
    let stride = (width + 1) * channels;
    let top_left = y * stride + x * channels + channel;
    let top_right = top_left + w * channels;
    let bottom_left = top_left + h * stride;
    let bottom_right = bottom_left + w * channels;
    integral[bottom_right] - integral[bottom_left] - integral[top_right] + integral[top_left]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_product_matches_manual_sum() {
        let x = [1.0, 2.0, 3.0];
        let y = [4.0, -5.0, 0.5];
        assert_eq!(vector_inner_product(&x, &y), 4.0 - 10.0 + 1.5);
    }

    #[test]
    fn integral_gives_rectangle_sums() {
        // 3x2 image: 1 2 3 / 4 5 6
        let (w, h) = (3, 2);
        let mut data = vec![0i64; (w + 1) * (h + 1)];
        let pixels = [1, 2, 3, 4, 5, 6];
        for y in 0..h {
            for x in 0..w {
                data[(y + 1) * (w + 1) + x + 1] = pixels[y * w + x];
            }
        }
        integral_in_place(&mut data, w, h, 1);

        assert_eq!(rect_sum(&data, w, 1, 0, 0, 0, 3, 2), 21);
        assert_eq!(rect_sum(&data, w, 1, 0, 1, 0, 2, 2), 16);
        assert_eq!(rect_sum(&data, w, 1, 0, 2, 1, 1, 1), 6);
    }

    #[test]
    fn integral_keeps_channels_apart() {
        let (w, h, ch) = (2, 2, 2);
        let mut data = vec![0i64; (w + 1) * (h + 1) * ch];
        for y in 0..h {
            for x in 0..w {
                let idx = ((y + 1) * (w + 1) + x + 1) * ch;
                data[idx] = 1;
                data[idx + 1] = 10;
            }
        }
        integral_in_place(&mut data, w, h, ch);
        assert_eq!(rect_sum(&data, w, ch, 0, 0, 0, 2, 2), 4);
        assert_eq!(rect_sum(&data, w, ch, 1, 0, 0, 2, 2), 40);
    }
}
