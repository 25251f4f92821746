use super::{Operation, Query};
use crate::{
    catalog::{Product, Strain},
    transport::Request,
};

/// Every product in the shop.
#[derive(Debug, Copy, Clone)]
pub struct GetProducts;

impl Operation for GetProducts {
    const NAME: &'static str = "getProducts";

    type Args = ();
    type Output = Vec<Product>;

    fn request(_: &()) -> Request { Request::get("/products") }
}

impl Query for GetProducts {}

/// Every known strain.
#[derive(Debug, Copy, Clone)]
pub struct GetStrains;

impl Operation for GetStrains {
    const NAME: &'static str = "getStrains";

    type Args = ();
    type Output = Vec<Strain>;

    fn request(_: &()) -> Request { Request::get("/strains") }
}

impl Query for GetStrains {}
