//! Change tracking: re-pack after every mutation and notify a callback.

use crate::{errors::PackError, packed::Packed, schema::Schema};

type UpdateFn<'s> = Box<dyn FnMut(&Packed) + 's>;
type ErrorFn<'s> = Box<dyn FnMut(&PackError) + 's>;

/// An instance paired with its schema and optional update/error callbacks.
///
/// The wrapper owns the value; `update` is the only mutation path, so every
/// mutation of a registered field triggers exactly one synchronous re-pack
/// and at most one callback invocation, in mutation order. Attaching a
/// callback has no immediate effect, only future mutations notify.
pub struct Tracked<'s, T> {
    schema: &'s Schema<T>,
    value: T,
    on_update: Option<UpdateFn<'s>>,
    on_error: Option<ErrorFn<'s>>,
}

impl<'s, T> Tracked<'s, T> {
    /// Wraps `value`. Nothing is packed until the first tracked mutation.
    pub fn new(schema: &'s Schema<T>, value: T) -> Self {
        Self {
            schema,
            value,
            on_update: None,
            on_error: None,
        }
    }

    /// Sets the update callback, replacing any previous one.
    pub fn on_update(&mut self, callback: impl FnMut(&Packed) + 's) -> &mut Self {
        self.on_update = Some(Box::new(callback));
        self
    }

    /// Sets the error callback, replacing any previous one.
    ///
    /// With an error callback attached, pack failures during `update` are
    /// forwarded to it and swallowed; without one they are returned to the
    /// mutator's caller.
    pub fn on_error(&mut self, callback: impl FnMut(&PackError) + 's) -> &mut Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Detaches both callbacks. Future mutations stop re-packing.
    pub fn untrack(&mut self) -> &mut Self {
        self.on_update = None;
        self.on_error = None;
        self
    }

    /// Applies a mutation, then re-packs the current state and notifies the
    /// update callback.
    ///
    /// The mutation itself always takes effect. With no update callback
    /// attached nothing is packed and the call cannot fail.
    pub fn update(&mut self, mutate: impl FnOnce(&mut T)) -> Result<(), PackError> {
        mutate(&mut self.value);

        let Some(on_update) = self.on_update.as_mut() else {
            return Ok(());
        };

        match self.schema.pack(&self.value) {
            Ok(packed) => {
                on_update(&packed);
                Ok(())
            }
            Err(err) => match self.on_error.as_mut() {
                Some(on_error) => {
                    on_error(&err);
                    Ok(())
                }
                None => Err(err),
            },
        }
    }

    /// Packs the current state without mutating it.
    pub fn pack(&self) -> Result<Packed, PackError> {
        self.schema.pack(&self.value)
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}
