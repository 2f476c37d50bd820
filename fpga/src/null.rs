/// Null backoff, the bus never pushes back.
pub struct Backoff;
impl<F> crate::Backoff<F> for Backoff {
    fn backoff(_: &mut F, _: usize) {}
}
