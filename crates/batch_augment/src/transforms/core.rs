use anyhow::{Context, Result};
use std::marker::PhantomData;

/// A stateless conversion from an input of type `I` to an output of type `O`.
///
/// Transforms compose with [`then`](Transform::then), which statically
/// chains two steps into one. "Stateless" here means no mutation between
/// calls; a transform may still consume randomness per call.
pub trait Transform<I, O>: Send + Sync {
    /// Applies the transformation to the input.
    fn apply(&self, input: I) -> Result<O>;

    /// Chains `self` with `next`, feeding this transform's output into it.
    #[inline]
    fn then<T, M>(self, next: T) -> Chain<Self, T, O>
    where
        Self: Sized,
        T: Transform<O, M>,
        O: Send,
        M: Send,
    {
        Chain {
            first: self,
            second: next,
            _marker: PhantomData,
        }
    }
}

/// Two transforms applied in sequence.
///
/// The `M` parameter pins the intermediate type so the compiler can check
/// that the output of `first` matches the input of `second`.
#[derive(Debug)]
pub struct Chain<A, B, M> {
    first: A,
    second: B,
    _marker: PhantomData<fn() -> M>,
}

impl<A, B, M> Chain<A, B, M> {
    /// Builds a chain directly. Prefer [`Transform::then`]; this is for
    /// assembling pipelines dynamically.
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            _marker: PhantomData,
        }
    }
}

impl<I, M, O, A, B> Transform<I, O> for Chain<A, B, M>
where
    A: Transform<I, M>,
    B: Transform<M, O>,
    M: Send,
{
    fn apply(&self, input: I) -> Result<O> {
        self.first
            .apply(input)
            .and_then(|mid| self.second.apply(mid))
            .with_context(|| {
                format!(
                    "Transform chain failed: {} → {}",
                    std::any::type_name::<A>(),
                    std::any::type_name::<B>(),
                )
            })
    }
}
