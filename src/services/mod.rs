pub mod generator;
pub mod razorpay;
