use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::error::BackendError;
use crate::query::{ValueExpr, Visualization};

/// Remote geospatial compute service.
///
/// Implementations receive fully-built query descriptions and perform one
/// synchronous round-trip per call.
pub trait ImageryBackend {
    /// Materialize a scalar value
    fn compute(&self, expr: &ValueExpr) -> Result<Value, BackendError>;

    /// Register a rendering and return its `{z}/{x}/{y}` tile URL template
    fn tile_url(&self, visualization: &Visualization) -> Result<String, BackendError>;
}

impl<B: ImageryBackend + ?Sized> ImageryBackend for &B {
    fn compute(&self, expr: &ValueExpr) -> Result<Value, BackendError> {
        (**self).compute(expr)
    }

    fn tile_url(&self, visualization: &Visualization) -> Result<String, BackendError> {
        (**self).tile_url(visualization)
    }
}

impl<B: ImageryBackend + ?Sized> ImageryBackend for Box<B> {
    fn compute(&self, expr: &ValueExpr) -> Result<Value, BackendError> {
        (**self).compute(expr)
    }

    fn tile_url(&self, visualization: &Visualization) -> Result<String, BackendError> {
        (**self).tile_url(visualization)
    }
}

/// Memoizing view over a backend for the duration of one analysis.
///
/// Each distinct expression is fetched at most once; dropping the session
/// drops every cached value.
pub struct Evaluation<'a, B: ImageryBackend + ?Sized> {
    backend: &'a B,
    values: RefCell<HashMap<String, Value>>,
    round_trips: Cell<usize>,
}

impl<'a, B: ImageryBackend + ?Sized> Evaluation<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Evaluation {
            backend,
            values: RefCell::new(HashMap::new()),
            round_trips: Cell::new(0),
        }
    }

    /// Number of requests actually sent to the backend
    pub fn round_trips(&self) -> usize {
        self.round_trips.get()
    }

    pub fn value(&self, expr: &ValueExpr) -> Result<Value, BackendError> {
        let key = cache_key(expr)?;
        if let Some(cached) = self.values.borrow().get(&key) {
            return Ok(cached.clone());
        }

        debug!(op = op_name(expr), "materializing value");
        self.round_trips.set(self.round_trips.get() + 1);
        let value = self.backend.compute(expr)?;
        self.values.borrow_mut().insert(key, value.clone());
        Ok(value)
    }

    /// Numeric value; JSON null reads as `None`
    pub fn number(&self, expr: &ValueExpr) -> Result<Option<f64>, BackendError> {
        match self.value(expr)? {
            Value::Null => Ok(None),
            Value::Number(n) => Ok(n.as_f64()),
            other => Err(BackendError::Decode(format!(
                "expected a number for {}, got {}",
                op_name(expr),
                other
            ))),
        }
    }

    /// Non-negative integer value (counts, sizes); null reads as `None`
    pub fn count(&self, expr: &ValueExpr) -> Result<Option<u64>, BackendError> {
        match self.number(expr)? {
            None => Ok(None),
            Some(v) if v >= 0.0 && v.fract() == 0.0 => Ok(Some(v as u64)),
            Some(v) => Err(BackendError::Decode(format!(
                "expected a count for {}, got {}",
                op_name(expr),
                v
            ))),
        }
    }

    pub fn tile_url(&self, visualization: &Visualization) -> Result<String, BackendError> {
        let key = serde_json::to_string(visualization)
            .map_err(|e| BackendError::Evaluation(format!("unserializable rendering: {}", e)))?;
        if let Some(Value::String(url)) = self.values.borrow().get(&key) {
            return Ok(url.clone());
        }

        debug!("requesting map tiles");
        self.round_trips.set(self.round_trips.get() + 1);
        let url = self.backend.tile_url(visualization)?;
        self.values
            .borrow_mut()
            .insert(key, Value::String(url.clone()));
        Ok(url)
    }
}

fn cache_key(expr: &ValueExpr) -> Result<String, BackendError> {
    serde_json::to_string(expr)
        .map_err(|e| BackendError::Evaluation(format!("unserializable expression: {}", e)))
}

fn op_name(expr: &ValueExpr) -> &'static str {
    match expr {
        ValueExpr::Area { .. } => "area",
        ValueExpr::Size { .. } => "size",
        ValueExpr::TimeStart { .. } => "time_start",
        ValueExpr::MaskedCount { .. } => "masked_count",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_core::ParcelGeometry;
    use crate::query::SceneQuery;
    use serde_json::json;

    struct Scripted {
        calls: Cell<usize>,
        answer: Value,
    }

    impl ImageryBackend for Scripted {
        fn compute(&self, _expr: &ValueExpr) -> Result<Value, BackendError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.answer.clone())
        }

        fn tile_url(&self, _visualization: &Visualization) -> Result<String, BackendError> {
            self.calls.set(self.calls.get() + 1);
            Ok("https://tiles.example/{z}/{x}/{y}".to_string())
        }
    }

    fn size_expr() -> ValueExpr {
        ValueExpr::Size {
            collection: SceneQuery::catalog("S2"),
        }
    }

    #[test]
    fn test_values_are_fetched_once() {
        let backend = Scripted {
            calls: Cell::new(0),
            answer: json!(3),
        };
        let session = Evaluation::new(&backend);
        assert_eq!(session.count(&size_expr()).unwrap(), Some(3));
        assert_eq!(session.count(&size_expr()).unwrap(), Some(3));
        assert_eq!(backend.calls.get(), 1);
        assert_eq!(session.round_trips(), 1);

        let area = ValueExpr::Area {
            geometry: ParcelGeometry::rectangle(0.0, 0.0, 1.0, 1.0).unwrap(),
            max_error_m: None,
        };
        session.number(&area).unwrap();
        assert_eq!(backend.calls.get(), 2);
    }

    #[test]
    fn test_null_and_bad_numbers() {
        let backend = Scripted {
            calls: Cell::new(0),
            answer: Value::Null,
        };
        let session = Evaluation::new(&backend);
        assert_eq!(session.count(&size_expr()).unwrap(), None);

        let backend = Scripted {
            calls: Cell::new(0),
            answer: json!("three"),
        };
        let session = Evaluation::new(&backend);
        assert!(matches!(
            session.count(&size_expr()),
            Err(BackendError::Decode(_))
        ));

        let backend = Scripted {
            calls: Cell::new(0),
            answer: json!(2.5),
        };
        let session = Evaluation::new(&backend);
        assert!(session.count(&size_expr()).is_err());
    }

    #[test]
    fn test_tile_url_cached() {
        let backend = Scripted {
            calls: Cell::new(0),
            answer: Value::Null,
        };
        let session = Evaluation::new(&backend);
        let vis = Visualization {
            image: crate::query::ImageExpr::constant(0.0),
            min: 0.0,
            max: 4.0,
            palette: vec!["#000000".to_string()],
        };
        let a = session.tile_url(&vis).unwrap();
        let b = session.tile_url(&vis).unwrap();
        assert_eq!(a, b);
        assert_eq!(backend.calls.get(), 1);
    }
}
