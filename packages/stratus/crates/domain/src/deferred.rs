use crate::error::{Result, SynthError};
use futures::future::{self, BoxFuture, FutureExt, Shared};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use tokio::sync::oneshot;

/// Bound for anything carried by a [`Deferred`].
pub trait Resolvable: Clone + Send + Sync + 'static {}
impl<T: Clone + Send + Sync + 'static> Resolvable for T {}

type SharedOutcome<T> = Shared<BoxFuture<'static, Result<T>>>;

/// A value that is only known once the backend has provisioned something.
///
/// Every clone observes the same outcome. Combinators are lazy: they return a
/// new `Deferred` and never poll the source themselves.
pub struct Deferred<T: Resolvable> {
    inner: SharedOutcome<T>,
}

impl<T: Resolvable> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Resolvable> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner.peek() {
            Some(Ok(_)) => "resolved",
            Some(Err(_)) => "failed",
            None => "pending",
        };
        write!(f, "Deferred(<{}>)", state)
    }
}

impl<T: Resolvable> Deferred<T> {
    pub fn of(value: T) -> Self {
        Self::from_future(future::ready(Ok(value)))
    }

    pub fn failed(err: SynthError) -> Self {
        Self::from_future(future::ready(Err(err)))
    }

    pub fn from_future<F>(fut: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            inner: fut.boxed().shared(),
        }
    }

    /// Creates an unresolved value and the handle that settles it.
    ///
    /// Dropping the [`Resolver`] without settling rejects every waiter with
    /// [`SynthError::Unresolved`] carrying `label`.
    pub fn pending(label: impl Into<String>) -> (Resolver<T>, Self) {
        let (tx, rx) = oneshot::channel::<Result<T>>();
        let label = label.into();
        let deferred = Self::from_future(async move {
            match rx.await {
                Ok(outcome) => outcome,
                Err(_) => Err(SynthError::Unresolved(label)),
            }
        });
        (Resolver { tx }, deferred)
    }

    pub fn map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Resolvable,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let source = self.inner.clone();
        Deferred::from_future(async move { source.await.map(f) })
    }

    pub fn and_then<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Resolvable,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        let source = self.inner.clone();
        Deferred::from_future(async move { source.await.and_then(f) })
    }

    pub fn combine<U, V, F>(&self, other: &Deferred<U>, f: F) -> Deferred<V>
    where
        U: Resolvable,
        V: Resolvable,
        F: FnOnce(T, U) -> V + Send + 'static,
    {
        let left = self.inner.clone();
        let right = other.inner.clone();
        Deferred::from_future(async move {
            let (l, r) = future::try_join(left, right).await?;
            Ok(f(l, r))
        })
    }

    /// Waits for every item; the result keeps the input order regardless of
    /// which item settles first.
    pub fn all<I>(items: I) -> Deferred<Vec<T>>
    where
        I: IntoIterator<Item = Deferred<T>>,
    {
        let pending: Vec<_> = items.into_iter().map(|d| d.inner).collect();
        Deferred::from_future(future::try_join_all(pending))
    }

    /// Suspends until the value settles.
    pub async fn get(&self) -> Result<T> {
        self.inner.clone().await
    }

    /// The outcome if the value has already been driven to completion.
    pub fn peek(&self) -> Option<Result<T>> {
        self.inner.peek().cloned()
    }
}

impl<T: Resolvable + Serialize> Deferred<T> {
    pub fn to_json(&self) -> Deferred<Value> {
        self.and_then(|value| serde_json::to_value(value).map_err(SynthError::from))
    }
}

/// Settles the matching [`Deferred`] created by [`Deferred::pending`].
pub struct Resolver<T> {
    tx: oneshot::Sender<Result<T>>,
}

impl<T> Resolver<T> {
    pub fn resolve(self, value: T) {
        self.settle(Ok(value));
    }

    pub fn reject(self, err: SynthError) {
        self.settle(Err(err));
    }

    pub fn settle(self, outcome: Result<T>) {
        // Nobody listening is fine: the value was simply never consumed.
        let _ = self.tx.send(outcome);
    }
}

/// A resource input: either known at declaration time or produced by another
/// resource.
#[derive(Clone, Debug)]
pub enum Input<T: Resolvable> {
    Known(T),
    Deferred(Deferred<T>),
}

impl<T: Resolvable> Input<T> {
    pub fn to_deferred(&self) -> Deferred<T> {
        match self {
            Input::Known(value) => Deferred::of(value.clone()),
            Input::Deferred(deferred) => deferred.clone(),
        }
    }

    pub fn known(&self) -> Option<&T> {
        match self {
            Input::Known(value) => Some(value),
            Input::Deferred(_) => None,
        }
    }

    pub fn map<U, F>(&self, f: F) -> Input<U>
    where
        U: Resolvable,
        F: FnOnce(T) -> U + Send + 'static,
    {
        match self {
            Input::Known(value) => Input::Known(f(value.clone())),
            Input::Deferred(deferred) => Input::Deferred(deferred.map(f)),
        }
    }
}

impl<T: Resolvable> From<Deferred<T>> for Input<T> {
    fn from(deferred: Deferred<T>) -> Self {
        Input::Deferred(deferred)
    }
}

impl From<&str> for Input<String> {
    fn from(value: &str) -> Self {
        Input::Known(value.to_string())
    }
}

impl From<String> for Input<String> {
    fn from(value: String) -> Self {
        Input::Known(value)
    }
}

impl From<Value> for Input<Value> {
    fn from(value: Value) -> Self {
        Input::Known(value)
    }
}

impl From<Deferred<String>> for Input<Value> {
    fn from(deferred: Deferred<String>) -> Self {
        Input::Deferred(deferred.map(Value::String))
    }
}

/// Provider-specific resource inputs, keyed by property name.
pub type Inputs = BTreeMap<String, Input<Value>>;

/// Resolves every input into a plain JSON object.
pub fn resolve_inputs(inputs: &Inputs) -> Deferred<Map<String, Value>> {
    let keys: Vec<String> = inputs.keys().cloned().collect();
    let values = Deferred::all(inputs.values().map(Input::to_deferred));
    values.map(move |values| keys.into_iter().zip(values).collect())
}

/// String interpolation over deferred segments.
///
/// ```ignore
/// let objects = Template::new().value(&bucket_arn).lit("/*").build();
/// ```
#[derive(Clone, Default)]
pub struct Template {
    segments: Vec<Input<String>>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lit(mut self, text: impl Into<String>) -> Self {
        self.segments.push(Input::Known(text.into()));
        self
    }

    pub fn value(mut self, value: &Deferred<String>) -> Self {
        self.segments.push(Input::Deferred(value.clone()));
        self
    }

    pub fn input(mut self, value: &Input<String>) -> Self {
        self.segments.push(value.clone());
        self
    }

    pub fn build(self) -> Deferred<String> {
        Deferred::all(self.segments.iter().map(Input::to_deferred)).map(|parts| parts.concat())
    }
}
