// Create a job parameter struct with a constructor and pool-ready erasure
//
// The generated `arg_ptr` performs the type erasure that submission
// expects, so call sites never spell the double cast by hand. Outer
// attributes (doc comments included) pass through to the struct.
//
// - Example
// use tempo_pool::tp_job_params;
//
// tp_job_params! {
//     /// One compiled row evaluation.
//     RowEval {
//         row: usize,
//         result: *mut f64,  // Just another field
//     }
// }
//
// // Usage:
// let mut result = 0.0f64;
// let job = RowEval::new(3, &mut result);
// let arg = job.arg_ptr();  // what add_job/add_jobs take
#[macro_export]
macro_rules! tp_job_params {
    ($(#[$meta:meta])* $struct_name:ident { $($field:ident: $field_type:ty),* $(,)? }) => {
        $(#[$meta])*
        pub struct $struct_name {
            $(pub $field: $field_type,)*
        }

        impl $struct_name {
            pub fn new($($field: $field_type),*) -> Self {
                $struct_name { $($field),* }
            }

            /// Type-erased pointer for submission to the pool. The struct
            /// must stay valid until `wait` returns; see the crate safety
            /// notes.
            #[inline]
            pub fn arg_ptr(&self) -> $crate::JobArgPointer {
                self as *const Self as $crate::JobArgPointer
            }
        }
    };
}

// Define a job function with the pool's fn-pointer signature
//
// Expands to a plain `fn(JobArgPointer)` so the bare name coerces to
// `JobFnPointer` at submission sites. The raw argument is checked against
// null in debug builds before being turned back into a typed reference.
//
// - Example
// use tempo_pool::{tp_define_job_fn, tp_job_params};
//
// tp_job_params! {
//     RowEval {
//         row: usize,
//         result: *mut f64,
//     }
// }
//
// tp_define_job_fn!(row_eval, RowEval, |params| {
//     // Safe code here - params is a typed reference
//     let value = (params.row * params.row) as f64;
//     unsafe { *params.result = value; }  // Only unsafe where necessary
// });
#[macro_export]
macro_rules! tp_define_job_fn {
    ($fn_name:ident, $param_type:ty, |$params:ident| $body:block) => {
        fn $fn_name(raw_arg: $crate::JobArgPointer) {
            debug_assert!(!raw_arg.is_null(), "job argument pointer is null");
            let $params: &$param_type = unsafe { &*raw_arg.cast() };
            $body
        }
    };
}

// Submit a job through its generated erasure
//
// - Example
// use tempo_pool::tp_submit_job;
//
// let pool = tempo_pool::TempoPool::new();
// let mut result = 0.0f64;
// let job = RowEval::new(3, &mut result);
// tp_submit_job!(pool, job, row_eval);
// pool.wait();
#[macro_export]
macro_rules! tp_submit_job {
    ($pool:expr, $params:expr, $job_fn:ident) => {
        $pool.add_job($job_fn, $params.arg_ptr(), None, None)
    };
}

// Write a measurement or result through a caller-owned slot
//
// Evaluates the slot expression once and refuses a null slot in debug
// builds.
//
// - Example
// use tempo_pool::tp_write;
//
// tp_define_job_fn!(my_job, MyJob, |params| {
//     let result = 42u64;
//     tp_write!(params.result, result);
// });
#[macro_export]
macro_rules! tp_write {
    ($slot:expr, $value:expr) => {{
        let slot = $slot;
        debug_assert!(!slot.is_null(), "result slot is null");
        unsafe { *slot = $value }
    }};
}
