// Block-Jacobi preconditioner implementation

use std::ops::Range;

use crate::core::traits::EngineScalar;
use crate::error::KError;
use crate::matrix::sparse::CsrMatrix;
use crate::preconditioner::ilu::Ilu0;
use crate::preconditioner::Preconditioner;

/// Split `0..n` into `parts` contiguous, nearly equal ranges (empty ones dropped).
pub(crate) fn contiguous_blocks(n: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.clamp(1, n.max(1));
    let base = n / parts;
    let extra = n % parts;
    let mut start = 0;
    let mut out = Vec::with_capacity(parts);
    for p in 0..parts {
        let len = base + usize::from(p < extra);
        if len > 0 {
            out.push(start..start + len);
        }
        start += len;
    }
    out
}

/// Block-Jacobi: the diagonal blocks of A, each approximately inverted with ILU(0).
#[derive(Clone, Debug)]
pub struct BlockJacobi<T> {
    /// Requested number of blocks
    pub total_blocks: usize,
    blocks: Vec<(Range<usize>, Ilu0<T>)>,
}

impl<T: EngineScalar> BlockJacobi<T> {
    pub fn new(total_blocks: usize) -> Self {
        Self {
            total_blocks: total_blocks.max(1),
            blocks: Vec::new(),
        }
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Range<usize>> {
        self.blocks.iter().map(|(r, _)| r)
    }

    fn apply_blocks(
        &self,
        r: &[T],
        z: &mut [T],
        transpose: bool,
    ) -> Result<(), KError> {
        if self.blocks.is_empty() && !r.is_empty() {
            return Err(KError::NotInitialized);
        }
        let solve = |range: &Range<usize>, ilu: &Ilu0<T>, out: &mut [T]| {
            if transpose {
                ilu.solve_transpose(&r[range.clone()], out)
            } else {
                ilu.solve(&r[range.clone()], out)
            }
        };
        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            let mut rest = &mut z[..];
            let mut chunks = Vec::with_capacity(self.blocks.len());
            for (range, _) in &self.blocks {
                let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
                chunks.push(head);
                rest = tail;
            }
            self.blocks
                .par_iter()
                .zip(chunks.into_par_iter())
                .try_for_each(|((range, ilu), out)| solve(range, ilu, out))
        }
        #[cfg(not(feature = "rayon"))]
        {
            for (range, ilu) in &self.blocks {
                solve(range, ilu, &mut z[range.clone()])?;
            }
            Ok(())
        }
    }
}

impl<T: EngineScalar> Preconditioner<T> for BlockJacobi<T> {
    /// Factor each diagonal block
    fn setup(&mut self, a: &CsrMatrix<T>) -> Result<(), KError> {
        let ranges = contiguous_blocks(a.nrows(), self.total_blocks);
        self.blocks = ranges
            .into_iter()
            .map(|range| {
                let idx: Vec<usize> = range.clone().collect();
                let ilu = Ilu0::factor(&a.submatrix(&idx))?;
                Ok((range, ilu))
            })
            .collect::<Result<_, KError>>()?;
        log::trace!("bjacobi: {} blocks", self.blocks.len());
        Ok(())
    }

    /// Apply: z = M⁻¹ r
    fn apply(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        self.apply_blocks(r, z, false)
    }

    fn apply_transpose(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        self.apply_blocks(r, z, true)
    }
}
