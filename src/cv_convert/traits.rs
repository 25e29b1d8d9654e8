/// Fallible conversion between OpenCV and foreign types.
pub trait TryFromCv<T>
where
    Self: Sized,
{
    type Error;

    fn try_from_cv(from: T) -> Result<Self, Self::Error>;
}

/// The reciprocal of [`TryFromCv`].
pub trait TryIntoCv<T> {
    type Error;

    fn try_into_cv(self) -> Result<T, Self::Error>;
}

impl<T, U> TryIntoCv<U> for T
where
    U: TryFromCv<T>,
{
    type Error = <U as TryFromCv<T>>::Error;

    fn try_into_cv(self) -> Result<U, Self::Error> {
        U::try_from_cv(self)
    }
}
