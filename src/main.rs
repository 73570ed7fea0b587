#[macro_use]
extern crate rocket;

#[launch]
fn rocket() -> _ {
    employee_api::rocket()
}
