//! Decoder for [BlurHash](https://blurha.sh) placeholder strings
//!
//! A hash stores a small number of cosine components (at most 9x9) in base 83.

use std::f32::consts::PI;

use error_derive::Error;

use crate::{
    color::rgb,
    texture::{dimensions_are_acceptable, PixelBuffer},
};

const BASE83_ALPHABET: &[u8; 83] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz#$%*+,-.:;=?@[]^_{|}~";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[msg = "hash length does not match the number of components"]
    InvalidLength,

    #[msg = "character outside of the base83 alphabet"]
    InvalidCharacter,

    #[msg = "invalid output dimensions"]
    RefuseToParse,
}

/// Render the hash at the given size
///
/// `punch` scales the contrast of the AC components, `1.0` renders the hash as encoded.
pub fn decode(hash: &str, width: usize, height: usize, punch: f32) -> Result<PixelBuffer, Error> {
    if !dimensions_are_acceptable(width, height) {
        return Err(Error::RefuseToParse);
    }

    let hash = hash.as_bytes();
    if hash.len() < 6 {
        log::error!("Blurhash is too short ({} characters)", hash.len());
        return Err(Error::InvalidLength);
    }

    let size_flag = decode_base83(&hash[..1])?;
    let components_y = (size_flag / 9 + 1) as usize;
    let components_x = (size_flag % 9 + 1) as usize;

    if hash.len() != 4 + 2 * components_x * components_y {
        log::error!(
            "Blurhash with {components_x}x{components_y} components has the wrong length ({})",
            hash.len()
        );
        return Err(Error::InvalidLength);
    }

    let quantized_maximum = decode_base83(&hash[1..2])?;
    let maximum = (quantized_maximum + 1) as f32 / 166. * punch;

    let mut colors = Vec::with_capacity(components_x * components_y);
    colors.push(decode_dc(decode_base83(&hash[2..6])?));
    for ac in hash[6..].chunks_exact(2) {
        colors.push(decode_ac(decode_base83(ac)?, maximum));
    }

    let mut pixels = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let mut color = [0.; 3];

            for j in 0..components_y {
                let basis_y = (PI * y as f32 * j as f32 / height as f32).cos();
                for i in 0..components_x {
                    let basis = (PI * x as f32 * i as f32 / width as f32).cos() * basis_y;
                    let component = colors[i + j * components_x];

                    for (channel, value) in color.iter_mut().zip(component) {
                        *channel += value * basis;
                    }
                }
            }

            pixels.push(rgb(
                linear_to_srgb(color[0]),
                linear_to_srgb(color[1]),
                linear_to_srgb(color[2]),
            ));
        }
    }

    Ok(PixelBuffer::from_data(pixels, width, height))
}

fn decode_base83(characters: &[u8]) -> Result<u32, Error> {
    characters.iter().try_fold(0, |value, character| {
        let digit = BASE83_ALPHABET
            .iter()
            .position(|c| c == character)
            .ok_or(Error::InvalidCharacter)?;
        Ok(value * 83 + digit as u32)
    })
}

fn decode_dc(value: u32) -> [f32; 3] {
    let [_, red, green, blue] = value.to_be_bytes();
    [
        srgb_to_linear(red),
        srgb_to_linear(green),
        srgb_to_linear(blue),
    ]
}

fn decode_ac(value: u32, maximum: f32) -> [f32; 3] {
    let quantized = [value / (19 * 19), (value / 19) % 19, value % 19];
    quantized.map(|channel| sign_pow((channel as f32 - 9.) / 9., 2.) * maximum)
}

fn sign_pow(value: f32, exponent: f32) -> f32 {
    value.abs().powf(exponent).copysign(value)
}

fn srgb_to_linear(value: u8) -> f32 {
    let value = value as f32 / 255.;
    if value <= 0.04045 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(value: f32) -> u8 {
    let value = value.clamp(0., 1.);
    let srgb = if value <= 0.003_130_8 {
        value * 12.92
    } else {
        1.055 * value.powf(1. / 2.4) - 0.055
    };

    (srgb * 255. + 0.5) as u8
}
