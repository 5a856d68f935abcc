//! Wait-for-all combinator.

use crate::context::Context;
use crate::promise::{first_arg, Function, Promise};
use core_types::Value;
use std::cell::RefCell;
use std::rc::Rc;

struct WaitForAllState {
    values: Vec<Value>,
    remaining: usize,
}

impl Context {
    /// Combines `inputs` into one promise.
    ///
    /// The result fulfills with the input values in input order once every
    /// input has fulfilled, or rejects with the reason of the first input to
    /// reject. Inputs that are not promises are first passed through
    /// [`Context::promise_resolve`], so thenables are waited through. An
    /// empty input fulfills immediately with an empty array.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_engine::Context;
    /// use core_types::Value;
    ///
    /// let cx = Context::new();
    /// let (a, b) = (cx.new_promise(), cx.new_promise());
    /// let all = cx.wait_for_all(&[a.to_value(), b.to_value(), Value::from("c")]);
    ///
    /// cx.resolve(&b, Value::from("b"));
    /// cx.resolve(&a, Value::from("a"));
    /// cx.run_jobs();
    /// assert_eq!(all.result(), Some(Value::Array(vec![Value::from("a"), Value::from("b"), Value::from("c")])));
    /// ```
    pub fn wait_for_all(&self, inputs: &[Value]) -> Promise {
        let aggregate = self.new_promise();
        if inputs.is_empty() {
            self.resolve(&aggregate, Value::Array(Vec::new()));
            return aggregate;
        }

        let functions = self.resolving_functions(&aggregate);
        let state = Rc::new(RefCell::new(WaitForAllState {
            values: vec![Value::Undefined; inputs.len()],
            remaining: inputs.len(),
        }));

        for (index, input) in inputs.iter().enumerate() {
            let element = self.promise_resolve(input.clone());

            let on_fulfilled = {
                let (state, functions) = (state.clone(), functions.clone());
                Function::new(move |args| {
                    let values = {
                        let mut state = state.borrow_mut();
                        state.values[index] = first_arg(args);
                        state.remaining -= 1;
                        (state.remaining == 0).then(|| std::mem::take(&mut state.values))
                    };
                    if let Some(values) = values {
                        functions.resolve(Value::Array(values));
                    }
                    Ok(Value::Undefined)
                })
            };
            let on_rejected = {
                let functions = functions.clone();
                Function::new(move |args| {
                    functions.reject(first_arg(args));
                    Ok(Value::Undefined)
                })
            };

            self.add_reactions(&element, Some(on_fulfilled), Some(on_rejected));
        }
        aggregate
    }
}
