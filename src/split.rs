use ndarray::Array1;

use crate::error::NdlocaleError;
use crate::error::Result;
use crate::indexing::Index;
use crate::indexing::IndexingExtent;

/// Fills the zero entries of `dims` so that the product over all axes
/// equals `num_locales`. Non-zero entries are preserved.
///
/// The rule is a balanced factorisation: the prime factors of the free
/// locale count are assigned largest-first to the zero axis with the
/// smallest partition count so far, ties resolved towards earlier axes.
/// It is deterministic, so every rank resolves the same grid.
pub fn resolve_dims(dims: &[Index], num_locales: usize) -> Result<Array1<Index>> {
    if dims.iter().any(|&d| d < 0) {
        return Err(NdlocaleError::config(
            0,
            format!("dims entries must be non-negative, got {:?}", dims),
        ));
    }
    let fixed: Index = dims.iter().filter(|&&d| d > 0).product();
    let num_locales_i = num_locales as Index;
    let zero_axes: Vec<usize> = (0..dims.len()).filter(|&a| dims[a] == 0).collect();
    if zero_axes.is_empty() {
        if fixed != num_locales_i {
            return Err(NdlocaleError::GeometricImpossibility {
                dims: dims.to_vec(),
                num_locales,
            });
        }
        return Ok(Array1::from_vec(dims.to_vec()));
    }
    if fixed == 0 || num_locales_i % fixed != 0 {
        return Err(NdlocaleError::GeometricImpossibility {
            dims: dims.to_vec(),
            num_locales,
        });
    }
    let mut resolved = Array1::from_vec(dims.to_vec());
    for &a in &zero_axes {
        resolved[a] = 1;
    }
    for factor in prime_factors(num_locales_i / fixed) {
        let target = zero_axes
            .iter()
            .copied()
            .min_by_key(|&a| (resolved[a], a))
            .expect("at least one zero axis");
        resolved[target] *= factor;
    }
    Ok(resolved)
}

/// Prime factors in descending order, largest first.
fn prime_factors(mut n: Index) -> Vec<Index> {
    let mut factors = Vec::new();
    let mut p = 2;
    while p * p <= n {
        while n % p == 0 {
            factors.push(p);
            n /= p;
        }
        p += 1;
    }
    if n > 1 {
        factors.push(n);
    }
    factors.reverse();
    factors
}

/// Block-partitions the box `[start, start + shape)` into `prod(dims)`
/// tiles, `dims[a]` pieces along axis `a`. Piece sizes along an axis
/// differ by at most one, with the larger pieces at lower indices.
///
/// Tiles are returned in row-major order of their grid coordinate; use
/// [`tile_index`] to address a tile by coordinate.
pub fn shape_split(
    start: &Array1<Index>,
    shape: &Array1<Index>,
    dims: &Array1<Index>,
) -> Vec<IndexingExtent> {
    assert_eq!(start.len(), shape.len());
    assert_eq!(dims.len(), shape.len());
    let ndim = shape.len();
    // Per-axis cut positions: dims[a] + 1 fenceposts.
    let cuts: Vec<Vec<Index>> = (0..ndim)
        .map(|a| {
            let d = dims[a];
            let q = shape[a] / d;
            let r = shape[a] % d;
            (0..=d)
                .map(|i| start[a] + i * q + i.min(r))
                .collect()
        })
        .collect();
    let num_tiles: Index = dims.iter().product();
    (0..num_tiles as usize)
        .map(|tile| {
            let coord = unravel_index(tile, dims);
            let beg: Array1<Index> = (0..ndim).map(|a| cuts[a][coord[a] as usize]).collect();
            let end: Array1<Index> = (0..ndim)
                .map(|a| cuts[a][coord[a] as usize + 1])
                .collect();
            IndexingExtent::from_arrays(beg, end)
        })
        .collect()
}

/// Row-major index of the tile at `coord` in a grid of shape `dims`.
pub fn tile_index(coord: &[Index], dims: &Array1<Index>) -> usize {
    assert_eq!(coord.len(), dims.len());
    let mut index = 0;
    for a in 0..dims.len() {
        debug_assert!(coord[a] >= 0 && coord[a] < dims[a]);
        index = index * dims[a] + coord[a];
    }
    index as usize
}

/// Row-major grid coordinate of tile `index` in a grid of shape `dims`.
pub fn unravel_index(index: usize, dims: &Array1<Index>) -> Vec<Index> {
    let mut coord = vec![0; dims.len()];
    let mut rest = index as Index;
    for a in (0..dims.len()).rev() {
        coord[a] = rest % dims[a];
        rest /= dims[a];
    }
    debug_assert_eq!(rest, 0);
    coord
}
